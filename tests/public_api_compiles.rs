use std::sync::Arc;

use media_queue_runtime::catalog::ModelFilter;
use media_queue_runtime::core::types::{MediaKind, ModelCatalog};
use media_queue_runtime::credentials::{EnvCredentialStore, StaticCredentialStore};
use media_queue_runtime::{
    ExecutionMode, MediaRuntime, MediaRuntimeBuilder, PollPolicy, QueueClient, QueueClientBuilder,
};

#[test]
fn test_public_api_compiles() {
    let _builder: MediaRuntimeBuilder = MediaRuntime::builder();
    let runtime = MediaRuntime::builder()
        .with_credential_store(Arc::new(StaticCredentialStore::with_api_key("key")))
        .build()
        .expect("default runtime should build");

    let _json = runtime
        .export_catalog_json(&ModelCatalog::default())
        .expect("catalog export should serialize");
    let _json_via_module =
        media_queue_runtime::catalog::export_catalog_json(&runtime.model_catalog())
            .expect("module export should be accessible");

    let videos = runtime.list_models(&ModelFilter::kind(MediaKind::Video));
    assert!(!videos.is_empty());

    let _queue_builder: QueueClientBuilder =
        QueueClient::builder(Arc::new(EnvCredentialStore::default()));
    let _client: QueueClient = runtime.queue_client().clone();
    assert_eq!(runtime.queue_client().poll_policy(), PollPolicy::default());

    assert_eq!(ExecutionMode::default(), ExecutionMode::Auto);
    assert_eq!(
        media_queue_runtime::routing::derive_status_base_path("/fal-ai/veo3/fast"),
        "/fal-ai/veo3"
    );

    let _runtime_path: media_queue_runtime::runtime::MediaRuntime =
        MediaRuntime::builder().build().expect("env-backed runtime");
}
