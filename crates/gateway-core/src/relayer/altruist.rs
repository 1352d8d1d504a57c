use super::errors::RelayError;
use crate::types::Payload;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Client, Method,
};
use std::time::Duration;

/// Plain HTTP client for the trusted fallback endpoint of a chain.
///
/// Requests go out unsigned: method, body and headers of the payload are forwarded as is
/// and the payload path is appended to the altruist URL.
#[derive(Debug, Clone)]
pub struct AltruistClient {
    client: Client,
    default_timeout: Duration,
}

impl AltruistClient {
    /// # Errors
    ///
    /// Returns [`RelayError::Altruist`] if the HTTP client cannot be built.
    pub fn new(user_agent: impl Into<String>, default_timeout: Duration) -> Result<Self, RelayError> {
        let client = Client::builder()
            .user_agent(user_agent.into())
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| RelayError::Altruist(e.to_string()))?;

        Ok(Self { client, default_timeout })
    }

    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Sends `payload` to `altruist_url` and returns the body of a 2xx response.
    ///
    /// # Errors
    ///
    /// - [`RelayError::AltruistTimeout`] when `timeout` elapses
    /// - [`RelayError::AltruistStatus`] on a non-2xx response
    /// - [`RelayError::Altruist`] for unusable URLs, methods or transport failures
    pub async fn relay(
        &self,
        altruist_url: &str,
        payload: &Payload,
        timeout: Option<Duration>,
    ) -> Result<String, RelayError> {
        let url = Self::request_url(altruist_url, &payload.path);
        let method = if payload.method.is_empty() {
            Method::POST
        } else {
            Method::from_bytes(payload.method.to_uppercase().as_bytes())
                .map_err(|e| RelayError::Altruist(e.to_string()))?
        };

        let mut headers = HeaderMap::with_capacity(payload.headers.len());
        for (name, value) in &payload.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RelayError::Altruist(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| RelayError::Altruist(e.to_string()))?;
            headers.insert(name, value);
        }
        if !payload.data.is_empty() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let mut request = self
            .client
            .request(method, url)
            .headers(headers)
            .timeout(timeout.unwrap_or(self.default_timeout));

        if !payload.data.is_empty() {
            request = request.body(payload.data.clone());
        }

        let response = request.send().await.map_err(Self::map_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::AltruistStatus { status: status.as_u16() });
        }

        response.text().await.map_err(Self::map_error)
    }

    fn request_url(altruist_url: &str, path: &str) -> String {
        if path.is_empty() {
            return altruist_url.to_string();
        }
        format!("{}/{}", altruist_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn map_error(error: reqwest::Error) -> RelayError {
        if error.is_timeout() {
            RelayError::AltruistTimeout
        } else if error.is_builder() {
            RelayError::Altruist("invalid altruist url".to_string())
        } else if error.is_connect() {
            RelayError::Altruist("connection refused or unreachable".to_string())
        } else {
            RelayError::Altruist("network error".to_string())
        }
    }
}
