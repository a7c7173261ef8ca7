use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::core::error::CredentialError;
use crate::core::traits::CredentialStore;

pub const DEFAULT_CREDENTIAL_NAME: &str = "falApi";
pub const DEFAULT_API_KEY_FIELD: &str = "apiKey";
pub const DEFAULT_API_KEY_ENV: &str = "FAL_KEY";

/// Resolves and caches the upstream API key.
///
/// The key is fetched from the store on the first [`ensure_api_key`] call and
/// reused afterwards. One resolver lives as long as the job executor that
/// owns it, so a rotated credential is picked up by the next executor.
///
/// [`ensure_api_key`]: CredentialResolver::ensure_api_key
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    credential_name: String,
    field: String,
    api_key: Option<String>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self::with_names(store, DEFAULT_CREDENTIAL_NAME, DEFAULT_API_KEY_FIELD)
    }

    pub fn with_names(
        store: Arc<dyn CredentialStore>,
        credential_name: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            store,
            credential_name: credential_name.into(),
            field: field.into(),
            api_key: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn ensure_api_key(&mut self) -> Result<&str, CredentialError> {
        if self.api_key.is_none() {
            let credential = self.store.lookup(&self.credential_name).await?;
            let api_key = validate_credential(&self.credential_name, &self.field, credential)?;
            debug!(credential = %self.credential_name, "resolved upstream api key");
            self.api_key = Some(api_key);
        }

        Ok(self.api_key.as_deref().unwrap_or_default())
    }
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("credential_name", &self.credential_name)
            .field("field", &self.field)
            .field("resolved", &self.api_key.is_some())
            .finish()
    }
}

fn validate_credential(
    credential_name: &str,
    field: &str,
    credential: Option<Value>,
) -> Result<String, CredentialError> {
    let credential = match credential {
        None | Some(Value::Null) => {
            return Err(CredentialError::NotFound {
                credential: credential_name.to_string(),
            });
        }
        Some(value) => value,
    };

    let fields = match credential {
        Value::Object(fields) => fields,
        other => {
            return Err(CredentialError::NotAnObject {
                credential: credential_name.to_string(),
                received_type: json_type_name(&other).to_string(),
            });
        }
    };

    if fields.is_empty() {
        return Err(CredentialError::EmptyObject {
            credential: credential_name.to_string(),
        });
    }

    let raw = match fields.get(field) {
        Some(value) => value,
        None => {
            return Err(CredentialError::MissingField {
                credential: credential_name.to_string(),
                field: field.to_string(),
                received_keys: fields.keys().cloned().collect(),
            });
        }
    };

    let rendered = match raw {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        other => {
            return Err(CredentialError::InvalidFieldType {
                credential: credential_name.to_string(),
                field: field.to_string(),
                received_type: json_type_name(other).to_string(),
            });
        }
    };

    if rendered.is_empty() {
        return Err(CredentialError::EmptyField {
            credential: credential_name.to_string(),
            field: field.to_string(),
        });
    }

    Ok(rendered)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// In-memory credential store.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    credentials: BTreeMap<String, Value>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(mut self, name: impl Into<String>, value: Value) -> Self {
        self.credentials.insert(name.into(), value);
        self
    }

    /// Store holding a single `{"apiKey": key}` credential under the default name.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let api_key: String = api_key.into();
        Self::new().with_credential(
            DEFAULT_CREDENTIAL_NAME,
            json!({ DEFAULT_API_KEY_FIELD: api_key }),
        )
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn lookup(&self, name: &str) -> Result<Option<Value>, CredentialError> {
        Ok(self.credentials.get(name).cloned())
    }
}

/// Reads credentials from environment variables.
///
/// Each credential name maps to one variable whose value is returned under
/// the mapped field, `apiKey` unless set otherwise. Unset variables yield
/// `None`.
#[derive(Debug, Clone)]
pub struct EnvCredentialStore {
    variables: BTreeMap<String, EnvVariable>,
}

#[derive(Debug, Clone)]
struct EnvVariable {
    variable: String,
    field: String,
}

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self {
            variables: BTreeMap::new(),
        }
        .with_variable(DEFAULT_CREDENTIAL_NAME, DEFAULT_API_KEY_ENV)
    }

    pub fn with_variable(self, name: impl Into<String>, variable: impl Into<String>) -> Self {
        self.with_variable_field(name, variable, DEFAULT_API_KEY_FIELD)
    }

    pub fn with_variable_field(
        mut self,
        name: impl Into<String>,
        variable: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.variables.insert(
            name.into(),
            EnvVariable {
                variable: variable.into(),
                field: field.into(),
            },
        );
        self
    }
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn lookup(&self, name: &str) -> Result<Option<Value>, CredentialError> {
        let Some(mapping) = self.variables.get(name) else {
            return Ok(None);
        };

        Ok(std::env::var(&mapping.variable).ok().map(|value| {
            let mut credential = Map::new();
            credential.insert(mapping.field.clone(), Value::String(value));
            Value::Object(credential)
        }))
    }
}

#[cfg(test)]
mod tests;
