//! JSON-RPC over raw stream sockets.
//!
//! One connection per call: the request is written as one JSON document
//! plus `\n`, and one newline-terminated document is read back.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::envelope::{Request, Response};
use crate::error::ClientError;

#[cfg(unix)]
use std::path::PathBuf;
#[cfg(unix)]
use tokio::net::UnixStream;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TcpClient {
    address: String,
    timeout: Duration,
}

impl TcpClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound on connect plus the whole exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, ClientError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_raw(method, params).await?.into_result()
    }

    pub async fn call_raw<P>(&self, method: &str, params: &P) -> Result<Response, ClientError>
    where
        P: Serialize + ?Sized,
    {
        let request = Request::new(method, params).encode()?;
        with_timeout(self.timeout, async {
            let stream = TcpStream::connect(self.address.as_str()).await?;
            exchange(stream, request).await
        })
        .await
    }
}

#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct UnixClient {
    path: PathBuf,
    timeout: Duration,
}

#[cfg(unix)]
impl UnixClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, ClientError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_raw(method, params).await?.into_result()
    }

    pub async fn call_raw<P>(&self, method: &str, params: &P) -> Result<Response, ClientError>
    where
        P: Serialize + ?Sized,
    {
        let request = Request::new(method, params).encode()?;
        with_timeout(self.timeout, async {
            let stream = UnixStream::connect(&self.path).await?;
            exchange(stream, request).await
        })
        .await
    }
}

async fn with_timeout<F>(timeout: Duration, call: F) -> Result<Response, ClientError>
where
    F: std::future::Future<Output = Result<Response, ClientError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| ClientError::Timeout(timeout))?
}

async fn exchange<S>(stream: S, mut request: Vec<u8>) -> Result<Response, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    request.push(b'\n');
    let mut stream = BufReader::new(stream);
    stream.get_mut().write_all(&request).await?;
    stream.get_mut().flush().await?;

    let mut line = Vec::new();
    if stream.read_until(b'\n', &mut line).await? == 0 {
        return Err(ClientError::Closed);
    }
    Response::decode(&line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    /// Accepts one connection, checks the request line, answers with `reply`.
    async fn one_shot_server(reply: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut stream = BufReader::new(stream);
            let mut line = String::new();
            stream.read_line(&mut line).await.unwrap();
            let request: Value = serde_json::from_str(&line).unwrap();
            assert_eq!(request["id"], 1);
            if !reply.is_empty() {
                stream.get_mut().write_all(reply.as_bytes()).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_call_decodes_result() {
        let addr = one_shot_server("{\"jsonrpc\":\"2.0\",\"result\":{\"result\":5.0},\"id\":1}\n").await;
        let value: Value = TcpClient::new(addr).call("sum", &json!({"a": 2, "b": 3})).await.unwrap();
        assert_eq!(value["result"].as_f64(), Some(5.0));
    }

    #[tokio::test]
    async fn test_closed_without_reply() {
        let addr = one_shot_server("").await;
        let err = TcpClient::new(addr)
            .call::<_, Value>("sum", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Closed));
    }

    #[tokio::test]
    async fn test_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _hold = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let err = TcpClient::new(addr)
            .with_timeout(Duration::from_millis(50))
            .call::<_, Value>("sum", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
    }
}
