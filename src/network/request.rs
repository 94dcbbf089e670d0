use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use super::Method;
use crate::error::{Outcome, RequestError};
use crate::request::RequestType;

/// One HTTP call. Built once, consumed by a [`super::NetworkProcessor`].
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRequest {
    method: Option<Method>,
    base_url: Option<String>,
    path: String,
    params: Vec<(String, String)>,
    headers: BTreeMap<String, String>,
    body: Option<Vec<u8>>,
    timeout: Option<Duration>,
    retry_count: usize,
    retry_delay: Duration,
    middleware_enabled: bool,
    excluded_middlewares: Vec<String>,
    description: Option<String>,
}

impl Default for NetworkRequest {
    fn default() -> Self {
        Self {
            method: None,
            base_url: None,
            path: String::new(),
            params: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
            retry_count: 1,
            retry_delay: Duration::ZERO,
            middleware_enabled: true,
            excluded_middlewares: Vec::new(),
            description: None,
        }
    }
}

impl NetworkRequest {
    pub fn builder() -> NetworkRequestBuilder {
        NetworkRequestBuilder::default()
    }

    pub fn to_builder(&self) -> NetworkRequestBuilder {
        NetworkRequestBuilder {
            request: self.clone(),
        }
    }

    pub fn method(&self) -> Outcome<Method> {
        self.method
            .ok_or_else(|| RequestError::validation("method cannot be empty"))
    }

    pub fn base_url(&self) -> Outcome<&str> {
        match self.base_url.as_deref() {
            Some(base) if !base.is_empty() => Ok(base),
            _ => Err(RequestError::validation("base url cannot be empty")),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Base URL joined with the path, query parameters percent-encoded.
    pub fn url(&self) -> Outcome<Url> {
        let base = self.base_url()?.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        let joined = if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        };

        let mut url = Url::parse(&joined)
            .map_err(|e| RequestError::validation(format!("invalid url {}: {}", joined, e)))?;
        if !self.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Check method, base URL and body rules. Performs no I/O.
    pub fn validate(&self) -> Outcome<()> {
        let method = self.method()?;
        self.base_url()?;
        if method == Method::Get && self.body.is_some() {
            return Err(RequestError::validation("GET request cannot carry a body"));
        }
        self.url()?;
        Ok(())
    }
}

impl RequestType for NetworkRequest {
    fn retries(&self) -> usize {
        self.retry_count.max(1)
    }

    fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    fn middleware_enabled(&self) -> bool {
        self.middleware_enabled
    }

    fn excluded_middlewares(&self) -> &[String] {
        &self.excluded_middlewares
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl fmt::Display for NetworkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = self.method.map(|m| m.to_string()).unwrap_or_else(|| "INVALID METHOD".into());
        let target = self
            .url()
            .map(|url| url.to_string())
            .unwrap_or_else(|_| self.path.clone());
        write!(
            f,
            "Performing {} {}. Description: {}",
            method,
            target,
            self.description.as_deref().unwrap_or("NONE")
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkRequestBuilder {
    request: NetworkRequest,
}

impl NetworkRequestBuilder {
    pub fn with_method(mut self, method: Method) -> Self {
        self.request.method = Some(method);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.request.base_url = Some(base_url.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.request.path = path.into();
        self
    }

    pub fn add_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.params.push((key.into(), value.into()));
        self
    }

    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    /// Serialize `body` as JSON and set the content type.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Outcome<Self> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| RequestError::validation(format!("body is not serializable: {}", e)))?;
        self.request.body = Some(bytes);
        self.request
            .headers
            .insert("content-type".into(), "application/json".into());
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.request.retry_count = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.request.retry_delay = delay;
        self
    }

    pub fn with_middleware_enabled(mut self, enabled: bool) -> Self {
        self.request.middleware_enabled = enabled;
        self
    }

    pub fn without_middleware(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.request.excluded_middlewares.contains(&name) {
            self.request.excluded_middlewares.push(name);
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.request.description = Some(description.into());
        self
    }

    pub fn build(self) -> Outcome<NetworkRequest> {
        self.request.validate()?;
        Ok(self.request)
    }

    pub fn build_unvalidated(self) -> NetworkRequest {
        self.request
    }
}
