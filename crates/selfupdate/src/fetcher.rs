use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// Abstraction over fetching release bytes from a distribution endpoint.
///
/// Implementations own the transport; the engine only sees whole bodies.
/// A non-2xx response is an error, never an empty body.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full body at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Builder for [`HttpFetcher`].
#[derive(Default)]
pub struct HttpFetcherBuilder {
    headers: HashMap<String, String>,
    accept_invalid_certs: bool,
    timeout: Option<Duration>,
}

impl HttpFetcherBuilder {
    /// Add a header sent with every request (e.g. an auth token).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Disable TLS certificate validation for self-signed distribution
    /// endpoints. Validation stays on unless this is called explicitly.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Overall per-request timeout. No timeout unless set.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the fetcher.
    pub fn build(self) -> Result<HttpFetcher, FetchError> {
        let mut builder = Client::builder();
        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| FetchError::Client(err.to_string()))?;
        Ok(HttpFetcher {
            client,
            headers: self.headers,
        })
    }
}

/// HTTP GET fetcher backed by [`reqwest`].
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    headers: HashMap<String, String>,
}

impl HttpFetcher {
    /// Create a new builder.
    pub fn builder() -> HttpFetcherBuilder {
        HttpFetcherBuilder::default()
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self {
            client: Client::new(),
            headers: HashMap::new(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        let response = request.send().await.map_err(|err| FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|err| FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_headers() {
        let fetcher = HttpFetcher::builder()
            .header("Authorization", "Bearer token")
            .header("X-Agent", "demo")
            .build()
            .unwrap();
        assert_eq!(
            fetcher.headers.get("Authorization").map(String::as_str),
            Some("Bearer token")
        );
        assert_eq!(fetcher.headers.len(), 2);
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let fetcher = HttpFetcher::default();
        let err = fetcher.fetch("http://127.0.0.1:1/nothing").await.unwrap_err();
        match err {
            FetchError::Transport { url, .. } => assert!(url.contains("127.0.0.1")),
            other => panic!("expected transport error, got {other}"),
        }
    }
}
