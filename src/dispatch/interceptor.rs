//! Pre-decode hook.
//!
//! An interceptor sees the raw stream before any JSON is read. It can peek
//! at buffered bytes with `fill_buf` without consuming them, and may answer
//! the exchange itself (protocol upgrades, health probes sharing the port).

use futures_util::future::BoxFuture;
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::dispatch::BoxError;

/// What the dispatcher does after the interceptor ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interception {
    /// The interceptor handled the exchange; nothing is decoded or written.
    Finished,
    /// Carry on with normal dispatch.
    Continue,
}

pub trait Interceptor: Send + Sync {
    fn intercept<'a>(
        &'a self,
        reader: &'a mut (dyn AsyncBufRead + Unpin + Send),
        writer: &'a mut (dyn AsyncWrite + Unpin + Send),
    ) -> BoxFuture<'a, Result<Interception, BoxError>>;
}
