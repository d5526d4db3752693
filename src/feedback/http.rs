//! HTTP transport shared by the hosted feedback providers.
//!
//! Both providers speak JSON over HTTPS, authenticate with static headers
//! and report failures as `{"error": {"message": ...}}`. Transient failures
//! (rate limits, 5xx, timeouts, refused connections) are retried with
//! exponential backoff.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GraderError, Result};

/// Maximum number of attempts for transient errors.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Where a provider lives and how its key is supplied.
#[derive(Debug, Clone, Copy)]
pub(super) struct Endpoint {
    /// Provider name used in messages.
    pub name: &'static str,
    pub url: &'static str,
    /// Environment variable users set the key in.
    pub key_var: &'static str,
}

/// A failed attempt and whether another one may succeed.
#[derive(Debug)]
struct Failure {
    error: GraderError,
    retryable: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// JSON POST client for one endpoint.
#[derive(Debug, Clone)]
pub(super) struct ApiTransport {
    endpoint: Endpoint,
    http: Client,
}

impl ApiTransport {
    /// Builds a client that sends `headers` with every request.
    pub fn new(endpoint: Endpoint, headers: HeaderMap, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| GraderError::feedback(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { endpoint, http })
    }

    /// Posts `body` and decodes a successful response.
    pub async fn post<B, R>(&self, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let name = self.endpoint.name;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("{name} API request attempt {attempt} of {MAX_RETRY_ATTEMPTS}");

            let failure = match self.http.post(self.endpoint.url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.map_err(|e| {
                        GraderError::feedback(format!("Failed to read {name} response: {e}"))
                    })?;

                    if status.is_success() {
                        return serde_json::from_str(&text).map_err(|e| {
                            GraderError::feedback(format!("Failed to parse {name} response: {e}"))
                        });
                    }
                    self.status_failure(status, &text)
                }
                Err(e) => self.transport_failure(&e),
            };

            if !failure.retryable || attempt >= MAX_RETRY_ATTEMPTS {
                return Err(failure.error);
            }

            warn!(
                "{name} API request failed (attempt {attempt}), retrying in {delay:?}: {}",
                failure.error
            );
            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }

    fn status_failure(&self, status: StatusCode, body: &str) -> Failure {
        let Endpoint { name, key_var, .. } = self.endpoint;

        if status == StatusCode::UNAUTHORIZED {
            return Failure {
                error: GraderError::feedback(format!(
                    "Authentication failed. Check your {key_var}."
                )),
                retryable: false,
            };
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Failure {
                error: GraderError::feedback(format!("Rate limited by {name}.")),
                retryable: true,
            };
        }

        // Includes Anthropic's 529 "overloaded".
        let retryable = status.is_server_error();
        let error = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => {
                GraderError::feedback(format!("{name} API error: {}", parsed.error.message))
            }
            Err(_) => GraderError::feedback(format!("{name} API error ({status}): {body}")),
        };
        Failure { error, retryable }
    }

    fn transport_failure(&self, error: &reqwest::Error) -> Failure {
        let name = self.endpoint.name;
        if error.is_timeout() {
            Failure {
                error: GraderError::feedback(format!("{name} request timed out.")),
                retryable: true,
            }
        } else if error.is_connect() {
            Failure {
                error: GraderError::feedback(format!(
                    "Failed to connect to {name} API. Check your network."
                )),
                retryable: true,
            }
        } else {
            Failure {
                error: GraderError::feedback(format!("{name} request failed: {error}")),
                retryable: false,
            }
        }
    }
}

/// Builds a header map, rejecting values that cannot travel in HTTP.
pub(super) fn headers(pairs: &[(&'static str, &str)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for &(name, value) in pairs {
        let mut value = HeaderValue::from_str(value).map_err(|_| {
            GraderError::feedback(format!("Invalid characters in {name} header"))
        })?;
        value.set_sensitive(true);
        map.insert(HeaderName::from_static(name), value);
    }
    Ok(map)
}
