use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::{self, ModelFilter};
use crate::core::error::{ConfigError, RuntimeError};
use crate::core::traits::{CredentialStore, MediaAdapter};
use crate::core::types::{
    AdapterContext, GenerationParams, MediaAsset, MediaBinary, MediaKind, MediaResult,
    ModelCatalog, ModelInfo,
};
use crate::credentials::{
    DEFAULT_API_KEY_ENV, DEFAULT_API_KEY_FIELD, DEFAULT_CREDENTIAL_NAME, EnvCredentialStore,
};
use crate::queue::{PollPolicy, QueueClient, QueueClientBuilder};
use crate::registry::AdapterRegistry;
use crate::transport::http::RetryPolicy;

/// Which upstream path a generation call takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Queue when the model supports it, otherwise the synchronous endpoint.
    #[default]
    Auto,
    Async,
    Sync,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub result: MediaResult,
    /// Downloaded assets, in asset order. Empty unless downloads are enabled.
    pub binaries: Vec<MediaBinary>,
}

pub struct MediaRuntime {
    registry: AdapterRegistry,
    queue: QueueClient,
    download_media: bool,
}

pub struct MediaRuntimeBuilder {
    adapters: Vec<Arc<dyn MediaAdapter>>,
    include_builtin_adapters: bool,
    queue: QueueClientBuilder,
    credential_store: Option<Arc<dyn CredentialStore>>,
    credential_name: String,
    api_key_field: String,
    download_media: bool,
}

impl MediaRuntime {
    /// Starts a builder with the built-in adapters and credentials read from
    /// `FAL_KEY` unless another store is supplied.
    pub fn builder() -> MediaRuntimeBuilder {
        MediaRuntimeBuilder {
            adapters: Vec::new(),
            include_builtin_adapters: true,
            queue: QueueClient::builder(Arc::new(EnvCredentialStore::default())),
            credential_store: None,
            credential_name: DEFAULT_CREDENTIAL_NAME.to_string(),
            api_key_field: DEFAULT_API_KEY_FIELD.to_string(),
            download_media: false,
        }
    }

    pub async fn generate(
        &self,
        model_id: &str,
        params: &GenerationParams,
        mode: ExecutionMode,
    ) -> Result<GenerationOutput, RuntimeError> {
        let adapter = self.registry.resolve(model_id)?;
        self.generate_with(adapter.as_ref(), params, mode).await
    }

    /// Runs a generation against an adapter that need not be registered.
    pub async fn generate_with(
        &self,
        adapter: &dyn MediaAdapter,
        params: &GenerationParams,
        mode: ExecutionMode,
    ) -> Result<GenerationOutput, RuntimeError> {
        let result = match resolve_mode(adapter, mode) {
            ExecutionMode::Sync => self.queue.execute_sync(adapter, params).await?,
            _ => self.queue.execute_async(adapter, params).await?,
        };

        let binaries = if self.download_media {
            self.download_assets(&result).await?
        } else {
            Vec::new()
        };

        info!(
            model = %result.model,
            request_id = result.request_id.as_deref().unwrap_or("-"),
            assets = result.assets.len(),
            downloaded = binaries.len(),
            "generation finished"
        );

        Ok(GenerationOutput { result, binaries })
    }

    /// Fetches every asset of `result`. Asset URLs are public CDN links, so
    /// no credentials are attached.
    pub async fn download_assets(
        &self,
        result: &MediaResult,
    ) -> Result<Vec<MediaBinary>, RuntimeError> {
        let ctx = AdapterContext::default();
        let mut binaries = Vec::with_capacity(result.assets.len());

        for (index, asset) in result.assets.iter().enumerate() {
            debug!(model = %result.model, url = %asset.url, "downloading asset");
            let (data, content_type) = self
                .queue
                .transport()
                .get_bytes(Some(result.model.as_str()), &asset.url, &ctx)
                .await?;

            binaries.push(MediaBinary {
                asset_index: index,
                data,
                content_type: content_type.or_else(|| asset.content_type.clone()),
                file_name: asset_file_name(asset, index),
            });
        }

        Ok(binaries)
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn queue_client(&self) -> &QueueClient {
        &self.queue
    }

    pub fn model_catalog(&self) -> ModelCatalog {
        self.registry.catalog()
    }

    pub fn list_models(&self, filter: &ModelFilter) -> Vec<ModelInfo> {
        catalog::filter_models(&self.registry.catalog(), filter)
    }

    pub fn export_catalog_json(&self, catalog: &ModelCatalog) -> Result<String, RuntimeError> {
        catalog::export_catalog_json(catalog)
    }
}

impl MediaRuntimeBuilder {
    pub fn with_adapter(mut self, adapter: Arc<dyn MediaAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Registers only the adapters passed via [`Self::with_adapter`].
    pub fn without_builtin_adapters(mut self) -> Self {
        self.include_builtin_adapters = false;
        self
    }

    pub fn with_credential_store(mut self, credential_store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(credential_store);
        self
    }

    /// Renames the credential and its key field. Without a custom store the
    /// environment store maps the new name and field to `FAL_KEY`.
    pub fn with_credential_names(
        mut self,
        credential_name: impl Into<String>,
        api_key_field: impl Into<String>,
    ) -> Self {
        self.credential_name = credential_name.into();
        self.api_key_field = api_key_field.into();
        self
    }

    pub fn with_queue_base_url(mut self, url: impl Into<String>) -> Self {
        self.queue = self.queue.with_queue_base_url(url);
        self
    }

    pub fn with_sync_base_url(mut self, url: impl Into<String>) -> Self {
        self.queue = self.queue.with_sync_base_url(url);
        self
    }

    pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.queue = self.queue.with_poll_policy(poll_policy);
        self
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.queue = self.queue.with_default_timeout_ms(timeout_ms);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.queue = self.queue.with_retry_policy(retry_policy);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.queue = self.queue.with_header(name, value);
        self
    }

    pub fn with_media_download(mut self, enabled: bool) -> Self {
        self.download_media = enabled;
        self
    }

    pub fn build(self) -> Result<MediaRuntime, ConfigError> {
        let mut registry = if self.include_builtin_adapters {
            AdapterRegistry::with_builtin_adapters()
        } else {
            AdapterRegistry::new()
        };
        for adapter in self.adapters {
            registry.register(adapter);
        }

        let credential_store = self.credential_store.unwrap_or_else(|| {
            Arc::new(EnvCredentialStore::new().with_variable_field(
                self.credential_name.clone(),
                DEFAULT_API_KEY_ENV,
                self.api_key_field.clone(),
            ))
        });
        let queue = self
            .queue
            .with_credential_store(credential_store)
            .with_credential_names(self.credential_name, self.api_key_field)
            .build()?;

        Ok(MediaRuntime {
            registry,
            queue,
            download_media: self.download_media,
        })
    }
}

fn resolve_mode(adapter: &dyn MediaAdapter, mode: ExecutionMode) -> ExecutionMode {
    match mode {
        ExecutionMode::Auto if adapter.capabilities().supports_async => ExecutionMode::Async,
        ExecutionMode::Auto if adapter.capabilities().supports_sync => ExecutionMode::Sync,
        ExecutionMode::Auto => ExecutionMode::Async,
        explicit => explicit,
    }
}

/// Picks the asset's own file name, then the last URL path segment, then
/// `{kind}-{index}.{ext}`.
pub(crate) fn asset_file_name(asset: &MediaAsset, index: usize) -> String {
    if let Some(file_name) = asset.file_name.as_deref().map(str::trim)
        && !file_name.is_empty()
    {
        return file_name.to_string();
    }

    let path = asset
        .url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let without_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    if let Some((_, segment)) = without_scheme.rsplit_once('/')
        && let Some((stem, _)) = segment.rsplit_once('.')
        && !stem.trim_matches('.').is_empty()
    {
        return segment.to_string();
    }

    format!(
        "{}-{index}.{}",
        kind_label(asset),
        asset.kind.default_extension()
    )
}

fn kind_label(asset: &MediaAsset) -> &'static str {
    match asset.kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
        MediaKind::Audio => "audio",
        MediaKind::File => "file",
    }
}
