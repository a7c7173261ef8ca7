use std::sync::Arc;

use serde_json::{Value, json};

use super::*;
use crate::core::error::CredentialError;
use crate::core::traits::CredentialStore;
use crate::test_support::CountingStore;

async fn resolve(value: Option<Value>) -> Result<String, CredentialError> {
    let store = Arc::new(CountingStore::new(value));
    let mut resolver = CredentialResolver::new(store);
    resolver.ensure_api_key().await.map(str::to_string)
}

#[tokio::test]
async fn test_ensure_api_key_looks_up_store_once() {
    let store = Arc::new(CountingStore::with_key("  key-123  "));
    let mut resolver = CredentialResolver::new(store.clone());
    assert!(!resolver.is_resolved());

    assert_eq!(resolver.ensure_api_key().await, Ok("key-123"));
    assert_eq!(resolver.ensure_api_key().await, Ok("key-123"));

    assert!(resolver.is_resolved());
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn test_failed_resolution_is_not_cached() {
    let store = Arc::new(CountingStore::new(None));
    let mut resolver = CredentialResolver::new(store.clone());

    assert!(resolver.ensure_api_key().await.is_err());
    assert!(resolver.ensure_api_key().await.is_err());
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_credential_validation_failures() {
    assert_eq!(
        resolve(None).await,
        Err(CredentialError::NotFound {
            credential: "falApi".to_string()
        })
    );
    assert_eq!(
        resolve(Some(Value::Null)).await,
        Err(CredentialError::NotFound {
            credential: "falApi".to_string()
        })
    );
    assert_eq!(
        resolve(Some(json!("raw-key"))).await,
        Err(CredentialError::NotAnObject {
            credential: "falApi".to_string(),
            received_type: "string".to_string(),
        })
    );
    assert_eq!(
        resolve(Some(json!({}))).await,
        Err(CredentialError::EmptyObject {
            credential: "falApi".to_string()
        })
    );
    assert_eq!(
        resolve(Some(json!({"key": "x", "token": "y"}))).await,
        Err(CredentialError::MissingField {
            credential: "falApi".to_string(),
            field: "apiKey".to_string(),
            received_keys: vec!["key".to_string(), "token".to_string()],
        })
    );
    assert_eq!(
        resolve(Some(json!({"apiKey": true}))).await,
        Err(CredentialError::InvalidFieldType {
            credential: "falApi".to_string(),
            field: "apiKey".to_string(),
            received_type: "boolean".to_string(),
        })
    );
    assert_eq!(
        resolve(Some(json!({"apiKey": "   "}))).await,
        Err(CredentialError::EmptyField {
            credential: "falApi".to_string(),
            field: "apiKey".to_string(),
        })
    );
}

#[tokio::test]
async fn test_numeric_api_key_is_accepted() {
    assert_eq!(resolve(Some(json!({"apiKey": 12345}))).await, Ok("12345".to_string()));
}

#[tokio::test]
async fn test_static_store_uses_custom_names() {
    let store = StaticCredentialStore::new().with_credential("mediaApi", json!({"token": "t-1"}));
    let mut resolver = CredentialResolver::with_names(Arc::new(store), "mediaApi", "token");
    assert_eq!(resolver.ensure_api_key().await, Ok("t-1"));

    let store = StaticCredentialStore::with_api_key("k-2");
    assert_eq!(
        store.lookup(DEFAULT_CREDENTIAL_NAME).await,
        Ok(Some(json!({"apiKey": "k-2"})))
    );
    assert_eq!(store.lookup("other").await, Ok(None));
}

#[tokio::test]
async fn test_env_store_reads_mapped_variable() {
    let variable = "MEDIA_QUEUE_RUNTIME_TEST_KEY";
    // SAFETY: the variable name is unique to this test.
    unsafe { std::env::set_var(variable, "env-key") };

    let store = EnvCredentialStore::new().with_variable("envApi", variable);
    assert_eq!(
        store.lookup("envApi").await,
        Ok(Some(json!({"apiKey": "env-key"})))
    );
    assert_eq!(store.lookup("unmapped").await, Ok(None));

    unsafe { std::env::remove_var(variable) };
    assert_eq!(store.lookup("envApi").await, Ok(None));
}

#[tokio::test]
async fn test_env_store_returns_value_under_custom_field() {
    let variable = "MEDIA_QUEUE_RUNTIME_CUSTOM_FIELD_KEY";
    // SAFETY: the variable name is unique to this test.
    unsafe { std::env::set_var(variable, "  field-key ") };

    let store = EnvCredentialStore::new().with_variable_field("falApi", variable, "key");
    assert_eq!(
        store.lookup("falApi").await,
        Ok(Some(json!({"key": "  field-key "})))
    );

    let mut resolver = CredentialResolver::with_names(Arc::new(store), "falApi", "key");
    let resolved = resolver.ensure_api_key().await.map(str::to_string);
    unsafe { std::env::remove_var(variable) };

    assert_eq!(resolved, Ok("field-key".to_string()));
}

#[test]
fn test_resolver_debug_does_not_expose_key() {
    let resolver = CredentialResolver::new(Arc::new(StaticCredentialStore::with_api_key("k")));
    let rendered = format!("{resolver:?}");
    assert!(rendered.contains("resolved: false"));
}
