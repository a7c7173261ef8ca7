use std::collections::BTreeMap;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::{REDACTED, is_secret_name};

/// Caller-supplied generation parameters.
///
/// Adapters pick the fields their model understands and reject values the
/// model cannot accept. `extra` is merged into the outbound payload verbatim
/// after the typed fields, so it can override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GenerationParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_images: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl GenerationParams {
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobSubmission {
    pub endpoint: String,
    pub payload: Map<String, Value>,
    pub method: Method,
}

impl JobSubmission {
    pub fn post(endpoint: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
            method: Method::POST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub request_id: String,
}

impl JobHandle {
    /// Reads `request_id` from a submission response.
    ///
    /// Returns `None` when the field is absent, null, not a string, or empty.
    pub fn from_submission_response(body: &Value) -> Option<Self> {
        body.get("request_id")
            .and_then(Value::as_str)
            .filter(|request_id| !request_id.is_empty())
            .map(|request_id| Self {
                request_id: request_id.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    InQueue,
    InProgress,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "IN_QUEUE" => Self::InQueue,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub status: JobStatus,
    pub error: Option<String>,
    pub raw: Value,
}

impl StatusSnapshot {
    pub fn from_value(raw: Value) -> Self {
        let status = JobStatus::from_wire(raw.get("status").and_then(Value::as_str).unwrap_or(""));
        let error = extract_error_text(&raw);

        Self { status, error, raw }
    }
}

fn extract_error_text(raw: &Value) -> Option<String> {
    let candidate = match raw.get("error") {
        Some(Value::String(text)) => Some(text.as_str()),
        Some(Value::Object(fields)) => fields.get("message").and_then(Value::as_str),
        _ => None,
    }
    .or_else(|| raw.get("detail").and_then(Value::as_str));

    candidate
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    File,
}

impl MediaKind {
    pub fn default_extension(self) -> &'static str {
        match self {
            Self::Image => "png",
            Self::Video => "mp4",
            Self::Audio => "mp3",
            Self::File => "bin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub kind: MediaKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// Normalized output of one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaResult {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<MediaAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl MediaResult {
    pub fn first_url(&self) -> Option<&str> {
        self.assets.first().map(|asset| asset.url.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBinary {
    pub asset_index: usize,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    pub supports_async: bool,
    pub supports_sync: bool,
    pub output: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelInfo {
    pub model_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    pub kind: MediaKind,
    pub supports_async: bool,
    pub supports_sync: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ModelCatalog {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelInfo>,
}

/// Per-call transport metadata: auth token and custom headers.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AdapterContext {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl std::fmt::Debug for AdapterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let metadata: BTreeMap<&str, &str> = self
            .metadata
            .iter()
            .map(|(key, value)| {
                if is_secret_name(&key.to_ascii_lowercase()) {
                    (key.as_str(), REDACTED)
                } else {
                    (key.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("AdapterContext")
            .field("metadata", &metadata)
            .finish()
    }
}
