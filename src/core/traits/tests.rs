use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::*;
use crate::core::types::MediaKind;

struct EchoAdapter;

impl MediaAdapter for EchoAdapter {
    fn model_id(&self) -> &str {
        "fal-ai/echo"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            supports_async: true,
            supports_sync: false,
            output: MediaKind::File,
        }
    }

    fn build_payload(&self, params: &GenerationParams) -> Result<Map<String, Value>, ConfigError> {
        let mut payload = Map::new();
        payload.insert("prompt".to_string(), json!(params.prompt));
        Ok(payload)
    }

    fn normalize(&self, raw: &Value) -> Result<MediaResult, UpstreamError> {
        Ok(MediaResult {
            model: self.model_id().to_string(),
            request_id: None,
            assets: Vec::new(),
            text: raw.get("output").and_then(Value::as_str).map(str::to_string),
            seed: None,
            raw: Some(raw.clone()),
        })
    }
}

struct EmptyStore;

#[async_trait]
impl CredentialStore for EmptyStore {
    async fn lookup(&self, _name: &str) -> Result<Option<Value>, CredentialError> {
        Ok(None)
    }
}

#[test]
fn test_media_adapter_defaults() {
    let adapter: Arc<dyn MediaAdapter> = Arc::new(EchoAdapter);

    assert_eq!(adapter.endpoint(), "/fal-ai/echo");
    assert_eq!(adapter.display_name(), "fal-ai/echo");
    assert_eq!(
        adapter.model_info(),
        ModelInfo {
            model_id: "fal-ai/echo".to_string(),
            display_name: "fal-ai/echo".to_string(),
            family: None,
            kind: MediaKind::File,
            supports_async: true,
            supports_sync: false,
        }
    );

    let payload = adapter
        .build_payload(&GenerationParams::from_prompt("hello"))
        .expect("payload");
    assert_eq!(Value::Object(payload), json!({"prompt": "hello"}));

    let result = adapter
        .normalize(&json!({"output": "done", "unused": 1}))
        .expect("normalize");
    assert_eq!(result.text.as_deref(), Some("done"));
}

#[tokio::test]
async fn test_credential_store_is_object_safe() {
    let store: Arc<dyn CredentialStore> = Arc::new(EmptyStore);
    assert_eq!(store.lookup("falApi").await, Ok(None));
}
