//! HTTP fetcher implementation
//!
//! This module handles all requests to the review site, including:
//! - The injectable [`Transport`] seam and its reqwest implementation
//! - The mandatory `From` and `User-Agent` headers
//! - Pacing every request through the shared [`RateLimiter`]
//! - Error classification (transport failure vs. HTTP status)
//!
//! The fetcher never retries; see [`RetryPolicy`](super::RetryPolicy).

use crate::config::ClientConfig;
use crate::crawler::RateLimiter;
use crate::storage::ReviewId;
use crate::{ConfigError, FetchError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, FROM, USER_AGENT};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Raw answer of the remote site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Decoded page body
    pub body: String,
}

/// Performs a single GET request
///
/// Implementations report network-level failures (connection refused,
/// timeout, unreadable body) as `FetchError::Transport`, and return every
/// response that arrived, whatever its status.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, headers: &HeaderMap) -> Result<RawResponse, FetchError>;
}

/// Builds the HTTP client used against the review site
///
/// # Arguments
///
/// * `timeout` - Overall request timeout
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Transport`] backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(timeout)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url, headers: &HeaderMap) -> Result<RawResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_error)?;

        Ok(RawResponse { status, body })
    }
}

/// Maps reqwest errors onto transport failures
fn classify_error(e: reqwest::Error) -> FetchError {
    let message = if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    };
    FetchError::Transport { message }
}

/// Rate-limited, identified access to the review site
///
/// Every request goes to the configured base URL with `s=datenbank`
/// prepended to its query parameters.
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    base_url: Url,
    headers: HeaderMap,
}

impl PageFetcher {
    /// Creates a fetcher from the client configuration
    ///
    /// # Errors
    ///
    /// * `ConfigError::InvalidUrl` - the base URL does not parse
    /// * `ConfigError::Validation` - `from` or `user_agent` are not valid header values
    pub fn new(
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        config: &ClientConfig,
    ) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid base URL '{}': {}", config.base_url, e))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(FROM, header_value("from", &config.from)?);
        headers.insert(USER_AGENT, header_value("user-agent", &config.user_agent)?);

        Ok(Self {
            transport,
            limiter,
            base_url,
            headers,
        })
    }

    /// Full request URL for a parameter set
    pub fn url_for(&self, params: &[(String, String)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("s", "datenbank");
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// Fetches one page
    ///
    /// Waits for the rate limiter, then performs a single GET.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - body of a 2xx response
    /// * `Err(FetchError::Http)` - any other status
    /// * `Err(FetchError::Transport)` - network failure or timeout
    pub async fn fetch(&self, params: &[(String, String)]) -> Result<String, FetchError> {
        let url = self.url_for(params);

        self.limiter.wait().await;
        tracing::debug!("GET {}", url);

        let response = self.transport.get(&url, &self.headers).await?;
        if (200..300).contains(&response.status) {
            Ok(response.body)
        } else {
            tracing::debug!("GET {} answered {}", url, response.status);
            Err(FetchError::Http {
                status: response.status,
            })
        }
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|_| {
        ConfigError::Validation(format!("{} is not a valid header value: {:?}", name, value))
    })
}

/// Query parameters of a review detail page
pub fn review_params(id: &ReviewId) -> Vec<(String, String)> {
    vec![("id".to_string(), id.to_string())]
}
