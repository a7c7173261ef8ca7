use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("model {model} does not support asynchronous execution")]
    AsyncUnsupported { model: String },
    #[error("model {model} does not support synchronous execution")]
    SyncUnsupported { model: String },
    #[error("invalid base url: {url}")]
    InvalidBaseUrl { url: String },
    #[error("invalid timeout: {timeout_ms} ms")]
    InvalidTimeout { timeout_ms: u64 },
    #[error("invalid retry policy: {reason}")]
    InvalidRetryPolicy { reason: String },
    #[error("invalid poll policy: {reason}")]
    InvalidPollPolicy { reason: String },
    #[error("invalid parameter {parameter} for {model}: {reason}")]
    InvalidParameter {
        model: String,
        parameter: String,
        reason: String,
    },
}

/// Failures while resolving the upstream API key from a credential store.
///
/// Each variant carries enough of what the store actually returned (keys,
/// JSON type names) to diagnose a misconfigured credential without echoing
/// the secret itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("credential store returned nothing for {credential}")]
    NotFound { credential: String },
    #[error("credential {credential} is not an object (received {received_type})")]
    NotAnObject {
        credential: String,
        received_type: String,
    },
    #[error("credential {credential} is an empty object")]
    EmptyObject { credential: String },
    #[error(
        "credential {credential} has no field {field} (received keys: {received_keys})",
        received_keys = .received_keys.join(", ")
    )]
    MissingField {
        credential: String,
        field: String,
        received_keys: Vec<String>,
    },
    #[error(
        "credential {credential} field {field} must be a string or number (received {received_type})"
    )]
    InvalidFieldType {
        credential: String,
        field: String,
        received_type: String,
    },
    #[error("credential {credential} field {field} is empty")]
    EmptyField { credential: String, field: String },
    #[error("credential store lookup for {credential} failed: {message}")]
    Store { credential: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("model not registered: {model}")]
    ModelNotRegistered { model: String },
}

/// Request context attached to upstream errors.
///
/// Secret-bearing headers are replaced by [`REDACTED`] before a value of this
/// type is constructed, so it is safe to log or surface to operators.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestDiagnostics {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

pub const REDACTED: &str = "<redacted>";

const SECRET_NAME_MARKERS: &[&str] = &["authorization", "cookie", "key", "secret", "token"];

/// Whether a header or metadata name may carry a secret. Expects lowercase.
pub(crate) fn is_secret_name(name: &str) -> bool {
    SECRET_NAME_MARKERS
        .iter()
        .any(|marker| name.contains(marker))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error(
        "upstream transport error{context}: {message}",
        context = format_context(.model.as_deref(), None, None, Some(.request.url.as_str()))
    )]
    Transport {
        model: Option<String>,
        message: String,
        request: Box<RequestDiagnostics>,
    },
    #[error(
        "upstream status error{context}: {message}",
        context = format_context(.model.as_deref(), None, Some(*.status_code), Some(.request.url.as_str()))
    )]
    Status {
        model: Option<String>,
        status_code: u16,
        body: Option<Value>,
        message: String,
        request: Box<RequestDiagnostics>,
    },
    #[error(
        "upstream serialization error{context}: {message}",
        context = format_context(.model.as_deref(), None, None, None)
    )]
    Serialization {
        model: Option<String>,
        message: String,
    },
    #[error(
        "missing request id in submission response{context}",
        context = format_context(Some(.model.as_str()), None, None, Some(.endpoint.as_str()))
    )]
    MissingRequestId { model: String, endpoint: String },
    #[error(
        "generation job failed{context}: {message}",
        context = format_context(Some(.model.as_str()), Some(.request_id.as_str()), None, None)
    )]
    JobFailed {
        model: String,
        request_id: String,
        message: String,
    },
    #[error(
        "result is missing mandatory field {field}{context}",
        context = format_context(Some(.model.as_str()), None, None, None)
    )]
    MissingResultField { model: String, field: String },
    #[error(
        "generation job did not finish within {waited_ms} ms{context}",
        context = format_context(Some(.model.as_str()), Some(.request_id.as_str()), None, None)
    )]
    PollTimeout {
        model: String,
        request_id: String,
        waited_ms: u64,
    },
}

impl UpstreamError {
    /// HTTP status of a non-2xx response, if this error came from one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub fn has_status(&self, codes: &[u16]) -> bool {
        self.status_code().is_some_and(|code| codes.contains(&code))
    }

    pub fn request(&self) -> Option<&RequestDiagnostics> {
        match self {
            Self::Transport { request, .. } | Self::Status { request, .. } => Some(&**request),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    ConfigError(#[from] ConfigError),
    #[error(transparent)]
    CredentialError(#[from] CredentialError),
    #[error(transparent)]
    RoutingError(#[from] RoutingError),
    #[error(transparent)]
    UpstreamError(#[from] UpstreamError),
}

impl RuntimeError {
    pub fn upstream_status_code(&self) -> Option<u16> {
        match self {
            Self::UpstreamError(error) => error.status_code(),
            _ => None,
        }
    }
}

fn format_context(
    model: Option<&str>,
    request_id: Option<&str>,
    status_code: Option<u16>,
    url: Option<&str>,
) -> String {
    let mut context = Vec::new();

    if let Some(model) = model {
        context.push(format!("model={model}"));
    }
    if let Some(request_id) = request_id {
        context.push(format!("request_id={request_id}"));
    }
    if let Some(status_code) = status_code {
        context.push(format!("status_code={status_code}"));
    }
    if let Some(url) = url.filter(|url| !url.is_empty()) {
        context.push(format!("url={url}"));
    }

    if context.is_empty() {
        String::new()
    } else {
        format!(" [{}]", context.join(", "))
    }
}
