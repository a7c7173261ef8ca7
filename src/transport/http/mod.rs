use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response};
use serde_json::Value;
use tracing::debug;

use crate::core::error::{ConfigError, REDACTED, RequestDiagnostics, UpstreamError, is_secret_name};
use crate::core::types::AdapterContext;

pub const AUTH_KEY_TOKEN_KEY: &str = "transport.auth.key_token";
pub const CUSTOM_HEADER_PREFIX: &str = "transport.header.";


/// Retry policy for a single HTTP call.
///
/// Only connect/timeout failures and the listed status codes are retried.
/// The default makes one attempt; job-level waiting belongs to the queue
/// poll loop, not to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub retryable_status_codes: Vec<u16>,
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidRetryPolicy {
                reason: "max_attempts must be >= 1".to_string(),
            });
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ConfigError::InvalidRetryPolicy {
                reason: "max_backoff_ms must be >= initial_backoff_ms".to_string(),
            });
        }
        if let Some(status) = self
            .retryable_status_codes
            .iter()
            .copied()
            .find(|status| !(100..=599).contains(status))
        {
            return Err(ConfigError::InvalidRetryPolicy {
                reason: format!("retryable status code must be in 100..=599: {status}"),
            });
        }
        Ok(())
    }

    fn should_retry_status(&self, status_code: u16) -> bool {
        self.retryable_status_codes.contains(&status_code)
    }

    fn backoff_duration_for_retry(&self, retry_index: u32) -> Duration {
        let shift = retry_index.min(63);
        let multiplier = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(multiplier)
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
            retryable_status_codes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    retry_policy: RetryPolicy,
    default_timeout_ms: Option<u64>,
}

impl HttpTransport {
    pub fn new(default_timeout_ms: Option<u64>, retry_policy: RetryPolicy) -> Result<Self, ConfigError> {
        Self::with_client(reqwest::Client::new(), default_timeout_ms, retry_policy)
    }

    pub fn with_client(
        client: reqwest::Client,
        default_timeout_ms: Option<u64>,
        retry_policy: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        Self::validate_timeout(default_timeout_ms)?;
        retry_policy.validate()?;

        Ok(Self {
            client,
            retry_policy,
            default_timeout_ms,
        })
    }

    pub async fn get_json(
        &self,
        model: Option<&str>,
        url: &str,
        ctx: &AdapterContext,
    ) -> Result<Value, UpstreamError> {
        self.request(model, Method::GET, url, None, None, ctx).await
    }

    pub async fn post_json(
        &self,
        model: Option<&str>,
        url: &str,
        body: &Value,
        ctx: &AdapterContext,
    ) -> Result<Value, UpstreamError> {
        self.request(model, Method::POST, url, Some(body), None, ctx)
            .await
    }

    /// Issues one JSON request. `timeout` overrides the transport default
    /// for this call only; with neither set the call may wait indefinitely.
    pub async fn request(
        &self,
        model: Option<&str>,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
        ctx: &AdapterContext,
    ) -> Result<Value, UpstreamError> {
        let response = self
            .execute(model, method, url, body, timeout, ctx)
            .await?;

        let text = response
            .text()
            .await
            .map_err(|error| UpstreamError::Serialization {
                model: model.map(str::to_string),
                message: format!("failed to read response body: {error}"),
            })?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|error| UpstreamError::Serialization {
            model: model.map(str::to_string),
            message: error.to_string(),
        })
    }

    /// Downloads raw bytes, returning them with the response content type.
    pub async fn get_bytes(
        &self,
        model: Option<&str>,
        url: &str,
        ctx: &AdapterContext,
    ) -> Result<(Vec<u8>, Option<String>), UpstreamError> {
        let response = self
            .execute(model, Method::GET, url, None, None, ctx)
            .await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|error| UpstreamError::Serialization {
                model: model.map(str::to_string),
                message: format!("failed to read response body: {error}"),
            })?;

        Ok((bytes.to_vec(), content_type))
    }

    async fn execute(
        &self,
        model: Option<&str>,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
        ctx: &AdapterContext,
    ) -> Result<Response, UpstreamError> {
        let headers = build_headers(model, ctx)?;
        let diagnostics = RequestDiagnostics {
            method: method.to_string(),
            url: url.to_string(),
            headers: redact_headers(&headers),
            body: body.cloned(),
        };
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|error| UpstreamError::Serialization {
                model: model.map(str::to_string),
                message: error.to_string(),
            })?;
        let timeout =
            timeout.or_else(|| self.default_timeout_ms.map(Duration::from_millis));

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            debug!(method = %method, url, attempt, "sending upstream request");

            let mut request_builder = self
                .client
                .request(method.clone(), url)
                .headers(headers.clone());
            if let Some(timeout) = timeout {
                request_builder = request_builder.timeout(timeout);
            }
            if let Some(payload) = &payload {
                request_builder = request_builder.body(payload.clone());
            }

            match request_builder.send().await {
                Ok(response) => {
                    let status_code = response.status().as_u16();
                    if response.status().is_success() {
                        return Ok(response);
                    }

                    let status_error =
                        build_status_error(model, status_code, response, &diagnostics).await;
                    debug!(url, status_code, attempt, "upstream returned error status");

                    if attempt < self.retry_policy.max_attempts
                        && self.retry_policy.should_retry_status(status_code)
                    {
                        self.sleep_before_retry(attempt).await;
                        continue;
                    }

                    return Err(status_error);
                }
                Err(error) => {
                    if attempt < self.retry_policy.max_attempts && is_retryable_transport(&error) {
                        self.sleep_before_retry(attempt).await;
                        continue;
                    }

                    return Err(UpstreamError::Transport {
                        model: model.map(str::to_string),
                        message: error.to_string(),
                        request: Box::new(diagnostics),
                    });
                }
            }
        }
    }

    fn validate_timeout(timeout_ms: Option<u64>) -> Result<(), ConfigError> {
        match timeout_ms {
            Some(0) => Err(ConfigError::InvalidTimeout { timeout_ms: 0 }),
            _ => Ok(()),
        }
    }

    async fn sleep_before_retry(&self, attempt: u32) {
        let retry_index = attempt.saturating_sub(1);
        let backoff = self.retry_policy.backoff_duration_for_retry(retry_index);
        tokio::time::sleep(backoff).await;
    }
}

async fn build_status_error(
    model: Option<&str>,
    status_code: u16,
    response: Response,
    diagnostics: &RequestDiagnostics,
) -> UpstreamError {
    let (body, message) = match response.text().await {
        Ok(text) if !text.trim().is_empty() => {
            let parsed = serde_json::from_str::<Value>(&text).ok();
            let message = parsed
                .as_ref()
                .and_then(upstream_error_message)
                .unwrap_or_else(|| text.clone());
            (Some(parsed.unwrap_or(Value::String(text))), message)
        }
        Ok(_) => (None, format!("http status {status_code}")),
        Err(error) => (
            None,
            format!("http status {status_code}; failed to read response body: {error}"),
        ),
    };

    UpstreamError::Status {
        model: model.map(str::to_string),
        status_code,
        body,
        message,
        request: Box::new(diagnostics.clone()),
    }
}

fn upstream_error_message(body: &Value) -> Option<String> {
    ["detail", "error", "message"]
        .iter()
        .find_map(|field| body.get(field).and_then(Value::as_str))
        .map(str::to_string)
}

fn build_headers(model: Option<&str>, ctx: &AdapterContext) -> Result<HeaderMap, UpstreamError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(token) = ctx.metadata.get(AUTH_KEY_TOKEN_KEY) {
        let auth_value = HeaderValue::from_str(&format!("Key {token}")).map_err(|error| {
            UpstreamError::Serialization {
                model: model.map(str::to_string),
                message: format!("invalid authorization header value: {error}"),
            }
        })?;
        headers.insert(AUTHORIZATION, auth_value);
    }

    for (key, value) in &ctx.metadata {
        if let Some(raw_name) = key.strip_prefix(CUSTOM_HEADER_PREFIX) {
            let header_name = HeaderName::from_bytes(raw_name.as_bytes()).map_err(|error| {
                UpstreamError::Serialization {
                    model: model.map(str::to_string),
                    message: format!("invalid header name: {raw_name}: {error}"),
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|error| UpstreamError::Serialization {
                    model: model.map(str::to_string),
                    message: format!("invalid header value for {raw_name}: {error}"),
                })?;
            headers.insert(header_name, header_value);
        }
    }

    Ok(headers)
}

pub(crate) fn redact_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let name = name.as_str().to_ascii_lowercase();
            let rendered = if is_secret_name(&name) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or_default().to_string()
            };
            (name, rendered)
        })
        .collect()
}

fn is_retryable_transport(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}
