//! Socket acceptor with backpressure.
//!
//! # Responsibilities
//! - Bind one TCP or Unix-domain endpoint
//! - Accept connections and hand each one a single dispatch cycle
//! - Enforce max_connections limit via semaphore
//! - Log accept errors and keep going
//! - Drain in-flight connections on shutdown

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::Level;

use crate::config::{ListenerConfig, SocketFamily};
use crate::dispatch::Dispatcher;
use crate::net::connection::{ConnectionId, ConnectionTracker};

#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Error type for listener setup.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("unix sockets are not supported on this platform")]
    UnixUnsupported,

    #[error("{path} exists and is not a socket")]
    UnixNotSocket { path: String },

    #[error("socket {path} is already in use")]
    UnixInUse { path: String },

    #[error("failed to inspect {path}: {source}")]
    UnixMetadata {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove stale socket {path}: {source}")]
    UnixCleanup {
        path: String,
        #[source]
        source: io::Error,
    },
}

enum Bound {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener, PathBuf),
}

enum Accepted {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

/// Runs of identical accept errors log one warning, then debug lines.
#[derive(Debug, Default)]
struct AcceptErrors {
    last: Option<io::ErrorKind>,
}

impl AcceptErrors {
    fn reset(&mut self) {
        self.last = None;
    }

    /// Log `e` and return the level it was logged at.
    fn record(&mut self, e: &io::Error) -> Level {
        let repeated = self.last == Some(e.kind());
        self.last = Some(e.kind());
        if repeated {
            tracing::debug!(error = %e, "accept failed again");
            Level::DEBUG
        } else {
            tracing::warn!(error = %e, "accept failed");
            Level::WARN
        }
    }
}

/// A bound endpoint that feeds accepted connections to a [`Dispatcher`].
///
/// When `max_connections` are open, accepting pauses until one closes.
pub struct Acceptor {
    bound: Bound,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
    tracker: ConnectionTracker,
    grace: Duration,
}

impl Acceptor {
    /// Bind the configured endpoint. Failure here is fatal to the caller.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let bound = match config.family {
            SocketFamily::Tcp => {
                let listener = TcpListener::bind(config.address.as_str())
                    .await
                    .map_err(|source| ListenerError::Bind {
                        address: config.address.clone(),
                        source,
                    })?;
                Bound::Tcp(listener)
            }
            #[cfg(unix)]
            SocketFamily::Unix => {
                let path = PathBuf::from(&config.address);
                let listener = bind_unix(&path)?;
                Bound::Unix(listener, path)
            }
            #[cfg(not(unix))]
            SocketFamily::Unix => return Err(ListenerError::UnixUnsupported),
        };

        let acceptor = Self {
            bound,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
            tracker: ConnectionTracker::new(),
            grace: Duration::from_secs(config.shutdown_grace_secs),
        };

        tracing::info!(
            endpoint = %acceptor.endpoint(),
            max_connections = config.max_connections,
            "listener bound"
        );
        Ok(acceptor)
    }

    /// Bound TCP address; `None` for Unix sockets.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.bound {
            Bound::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Bound::Unix(..) => None,
        }
    }

    /// Human-readable endpoint for logs.
    pub fn endpoint(&self) -> String {
        match &self.bound {
            Bound::Tcp(listener) => listener
                .local_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:?".to_string()),
            #[cfg(unix)]
            Bound::Unix(_, path) => format!("unix:{}", path.display()),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept until `shutdown` resolves, then drain in-flight connections.
    pub async fn serve_with_shutdown<F>(self, dispatcher: Arc<Dispatcher>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut accept_errors = AcceptErrors::default();

        loop {
            // Acquire permit first (backpressure)
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = Arc::clone(&self.connection_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    accept_errors.reset();
                    let guard = self.tracker.track();
                    let dispatcher = Arc::clone(&dispatcher);
                    tracing::debug!(
                        connection_id = %guard.id(),
                        peer = %peer,
                        available_permits = self.connection_limit.available_permits(),
                        "connection accepted"
                    );
                    tokio::spawn(async move {
                        let _permit = permit;
                        match stream {
                            Accepted::Tcp(stream) => {
                                serve_connection(stream, &dispatcher, guard.id()).await
                            }
                            #[cfg(unix)]
                            Accepted::Unix(stream) => {
                                serve_connection(stream, &dispatcher, guard.id()).await
                            }
                        }
                        drop(guard);
                    });
                }
                Err(e) => {
                    accept_errors.record(&e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }

        let endpoint = self.endpoint();
        let Self { bound, tracker, grace, .. } = self;
        close(bound);

        tracing::info!(
            endpoint = %endpoint,
            active = tracker.active_count(),
            "listener stopped, draining connections"
        );
        if !tracker.wait_idle(grace).await {
            tracing::warn!(
                active = tracker.active_count(),
                grace_secs = grace.as_secs(),
                "grace period elapsed with connections still open"
            );
        }
    }

    /// Accept forever.
    pub async fn serve(self, dispatcher: Arc<Dispatcher>) {
        self.serve_with_shutdown(dispatcher, std::future::pending())
            .await
    }

    async fn accept(&self) -> io::Result<(Accepted, String)> {
        match &self.bound {
            Bound::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                Ok((Accepted::Tcp(stream), addr.to_string()))
            }
            #[cfg(unix)]
            Bound::Unix(listener, path) => {
                let (stream, _) = listener.accept().await?;
                Ok((Accepted::Unix(stream), format!("unix:{}", path.display())))
            }
        }
    }
}

/// Bind `address` and dispatch every accepted connection until the process exits.
pub async fn start_server(
    dispatcher: Arc<Dispatcher>,
    address: &str,
    family: SocketFamily,
) -> Result<(), ListenerError> {
    let config = ListenerConfig {
        address: address.to_string(),
        family,
        ..ListenerConfig::default()
    };
    Acceptor::bind(&config).await?.serve(dispatcher).await;
    Ok(())
}

/// One dispatch cycle, then close.
async fn serve_connection<S>(mut stream: S, dispatcher: &Dispatcher, id: ConnectionId)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (reader, writer) = tokio::io::split(&mut stream);
    if let Err(e) = dispatcher.execute(reader, writer).await {
        tracing::debug!(connection_id = %id, error = %e, "connection ended early");
    }
    if let Err(e) = stream.shutdown().await {
        tracing::trace!(connection_id = %id, error = %e, "shutdown after response failed");
    }
}

fn close(bound: Bound) {
    match bound {
        Bound::Tcp(listener) => drop(listener),
        #[cfg(unix)]
        Bound::Unix(listener, path) => {
            drop(listener);
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove socket file");
                }
            }
        }
    }
}

/// Bind a Unix socket, clearing a stale socket file left by a dead process.
#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    let path_str = || path.display().to_string();

    if path.exists() {
        let metadata = std::fs::symlink_metadata(path).map_err(|source| {
            ListenerError::UnixMetadata {
                path: path_str(),
                source,
            }
        })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::UnixNotSocket { path: path_str() });
        }
        match std::os::unix::net::UnixStream::connect(path) {
            Ok(_stream) => return Err(ListenerError::UnixInUse { path: path_str() }),
            Err(e)
                if e.kind() == io::ErrorKind::ConnectionRefused
                    || e.kind() == io::ErrorKind::NotFound =>
            {
                tracing::debug!(path = %path_str(), "removing stale socket file");
                std::fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                    path: path_str(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(ListenerError::Bind {
                    address: path_str(),
                    source,
                })
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        address: path_str(),
        source,
    })
}
