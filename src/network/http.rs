use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use super::{Method, NetworkRequest, NetworkTransport};
use crate::error::{Outcome, RequestError};

/// [`NetworkTransport`] over a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Outcome<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Client-wide timeout; a request's own timeout takes precedence.
    pub fn with_timeout(timeout: Duration) -> Outcome<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Network(format!("failed to build http client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl NetworkTransport for HttpTransport {
    fn execute(&self, request: &NetworkRequest) -> Outcome<Vec<u8>> {
        let url = request.url()?;
        let method = match request.method()? {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url.clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder
            .send()
            .map_err(|e| RequestError::Network(format!("{} failed: {}", url, e)))?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "http response");
        if !status.is_success() {
            return Err(RequestError::Network(format!("{} returned status {}", url, status)));
        }

        let bytes = response
            .bytes()
            .map_err(|e| RequestError::Network(format!("failed to read body from {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}
