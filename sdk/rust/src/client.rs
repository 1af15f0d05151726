//! JSON-RPC over HTTP(S).

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::envelope::{Request, Response};
use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    /// Accept self-signed or otherwise invalid certificates.
    pub insecure: bool,
    pub timeout: Duration,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// POSTs one envelope per call to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    endpoint: Url,
}

impl HttpClient {
    pub fn new(endpoint: &str) -> Result<Self, ClientError> {
        Self::with_options(endpoint, HttpClientOptions::default())
    }

    pub fn with_options(endpoint: &str, options: HttpClientOptions) -> Result<Self, ClientError> {
        let url = Url::parse(endpoint)
            .map_err(|_| ClientError::InvalidEndpoint(endpoint.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidEndpoint(endpoint.to_string()));
        }

        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure)
            .build()?;

        Ok(Self {
            client,
            endpoint: url,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Call `method` and decode its result as `T`.
    pub async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, ClientError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_raw(method, params).await?.into_result()
    }

    /// Call `method` and return the whole response envelope.
    pub async fn call_raw<P>(&self, method: &str, params: &P) -> Result<Response, ClientError>
    where
        P: Serialize + ?Sized,
    {
        let body = Request::new(method, params).encode()?;
        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Err(ClientError::NoResponse);
        }
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Response::decode(&bytes)
    }
}
