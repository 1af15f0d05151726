//! Byte-stream framing for envelopes.
//!
//! # Responsibilities
//! - Read exactly one JSON value from a buffered reader
//! - Enforce the request size limit while reading
//! - Encode a response with the configured framing (CGI header, newline)

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::DispatchConfig;
use crate::protocol::envelope::Response;

/// Header block written ahead of every envelope in CGI mode.
pub const CGI_HEADER: &[u8] = b"Content-Type: application/json\r\n\r\n";

/// Errors raised while reading a request document.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream ended before a complete JSON value arrived.
    #[error("unexpected end of input after {0} bytes")]
    Eof(usize),

    /// The bytes are not well-formed JSON.
    #[error("malformed JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    /// The document grew past the configured limit.
    #[error("request exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The underlying reader failed.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// How a response document is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    pub cgi_headers: bool,
    pub cgi_headers_on_error: bool,
    pub newline: bool,
}

impl Default for Framing {
    fn default() -> Self {
        Self {
            cgi_headers: false,
            cgi_headers_on_error: true,
            newline: true,
        }
    }
}

impl From<&DispatchConfig> for Framing {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            cgi_headers: config.cgi_headers,
            cgi_headers_on_error: config.cgi_headers_on_error,
            newline: config.newline_delimited,
        }
    }
}

/// Read bytes until they hold one complete JSON value.
///
/// Bytes following the value in the same read are discarded; each exchange
/// carries a single document.
pub async fn read_value<R>(reader: &mut R, limit: usize) -> Result<Value, DecodeError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return match parse_one(&buf)? {
                Some(value) => Ok(value),
                None => Err(DecodeError::Eof(buf.len())),
            };
        }
        let taken = chunk.len();
        buf.extend_from_slice(chunk);
        reader.consume(taken);

        if buf.len() > limit {
            return Err(DecodeError::TooLarge { limit });
        }
        if let Some(value) = parse_one(&buf)? {
            return Ok(value);
        }
    }
}

/// `Ok(None)` means "need more bytes".
fn parse_one(buf: &[u8]) -> Result<Option<Value>, DecodeError> {
    let mut values = serde_json::Deserializer::from_slice(buf).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => Ok(Some(value)),
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(DecodeError::Syntax(e)),
        None => Ok(None),
    }
}

/// Serialize a response with its framing.
pub fn encode(response: &Response, framing: Framing) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::with_capacity(128);
    let header = framing.cgi_headers && (framing.cgi_headers_on_error || !response.is_error());
    if header {
        out.extend_from_slice(CGI_HEADER);
    }
    serde_json::to_writer(&mut out, response)?;
    if framing.newline {
        out.push(b'\n');
    }
    Ok(out)
}

/// Encode and flush one response onto the writer.
pub async fn write_response<W>(
    writer: &mut W,
    response: &Response,
    framing: Framing,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = encode(response, framing)?;
    writer.write_all(&bytes).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RequestId, RpcError};
    use serde_json::json;
    use tokio::io::{AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn test_reads_single_value() {
        let mut reader = BufReader::new(&br#"{"method":"ping"} trailing"#[..]);
        let value = read_value(&mut reader, 1024).await.unwrap();
        assert_eq!(value, json!({"method": "ping"}));
    }

    #[tokio::test]
    async fn test_reads_value_split_across_writes() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(server);

        let writer = tokio::spawn(async move {
            client.write_all(br#"{"jsonrpc":"2.0","#).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            client.write_all(br#""method":"sum","id":1}"#).await.unwrap();
            // Keep the pipe open: the reader must not need EOF.
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            drop(client);
        });

        let value = read_value(&mut reader, 1024).await.unwrap();
        assert_eq!(value["method"], "sum");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_json_is_syntax_error() {
        let mut reader = BufReader::new(&b"{\"a\": tru }"[..]);
        let err = read_value(&mut reader, 1024).await.unwrap_err();
        assert!(matches!(err, DecodeError::Syntax(_)));
    }

    #[tokio::test]
    async fn test_truncated_and_empty_input() {
        let mut reader = BufReader::new(&b"{\"a\": 1"[..]);
        assert!(matches!(
            read_value(&mut reader, 1024).await.unwrap_err(),
            DecodeError::Eof(7)
        ));

        let mut reader = BufReader::new(&b"   "[..]);
        assert!(matches!(
            read_value(&mut reader, 1024).await.unwrap_err(),
            DecodeError::Eof(3)
        ));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let body = format!("{{\"pad\":\"{}\"}}", "x".repeat(100));
        let mut reader = BufReader::new(body.as_bytes());
        let err = read_value(&mut reader, 16).await.unwrap_err();
        assert!(matches!(err, DecodeError::TooLarge { limit: 16 }));
    }

    #[test]
    fn test_cgi_framing() {
        let ok = Response::success(RequestId::from(1u64), json!(true));
        let err = Response::failure(RequestId::Null, RpcError::parse_error());

        let framing = Framing {
            cgi_headers: true,
            cgi_headers_on_error: false,
            newline: true,
        };
        let bytes = encode(&ok, framing).unwrap();
        assert!(bytes.starts_with(CGI_HEADER));
        assert!(bytes.ends_with(b"}\n"));
        assert!(!encode(&err, framing).unwrap().starts_with(CGI_HEADER));

        let plain = encode(
            &ok,
            Framing {
                cgi_headers: false,
                newline: false,
                ..framing
            },
        )
        .unwrap();
        assert_eq!(plain, br#"{"jsonrpc":"2.0","result":true,"id":1}"#.to_vec());
    }
}
