use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::error::{ConfigError, CredentialError, UpstreamError};
use crate::core::types::{AdapterCapabilities, GenerationParams, MediaResult, ModelInfo};
use crate::routing::ModelFamily;

/// Model adapter contract: declares what a model supports, builds its
/// request payload, and normalizes its raw result.
///
/// Adapters are pure. Transport, credentials, and polling live in
/// [`crate::queue::QueueClient`].
pub trait MediaAdapter: Send + Sync {
    /// Upstream model id, e.g. `fal-ai/kling-video/v2/master/text-to-video`.
    fn model_id(&self) -> &str;

    /// Declares the execution modes and output kind of this model.
    fn capabilities(&self) -> AdapterCapabilities;

    /// Submission path appended to the queue or sync base URL.
    fn endpoint(&self) -> String {
        format!("/{}", self.model_id().trim_start_matches('/'))
    }

    /// Human-facing name used by model pickers.
    fn display_name(&self) -> String {
        self.model_id().to_string()
    }

    /// Builds the JSON body submitted upstream.
    fn build_payload(&self, params: &GenerationParams) -> Result<Map<String, Value>, ConfigError>;

    /// Maps a completed job's raw payload into the normalized result.
    fn normalize(&self, raw: &Value) -> Result<MediaResult, UpstreamError>;

    fn model_info(&self) -> ModelInfo {
        let capabilities = self.capabilities();
        ModelInfo {
            model_id: self.model_id().to_string(),
            display_name: self.display_name(),
            family: ModelFamily::detect(&self.endpoint()).map(|family| family.name().to_string()),
            kind: capabilities.output,
            supports_async: capabilities.supports_async,
            supports_sync: capabilities.supports_sync,
        }
    }
}

/// Lookup-by-name access to externally managed credentials.
///
/// Returns the stored credential object as-is; validation is the resolver's
/// job.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<Option<Value>, CredentialError>;
}

#[cfg(test)]
mod tests;
