use std::sync::Arc;

use crate::adapters::builtin_adapters;
use crate::core::error::{RuntimeError, UpstreamError};
use crate::core::traits::MediaAdapter;
use crate::core::types::{MediaKind, ModelCatalog, ModelInfo};

/// Narrows a catalog for model pickers. Empty filter keeps everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelFilter {
    pub kind: Option<MediaKind>,
    /// Case-insensitive substring of the model id or display name.
    pub search: Option<String>,
    pub async_only: bool,
    pub sync_only: bool,
}

impl ModelFilter {
    pub fn kind(kind: MediaKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn matches(&self, model: &ModelInfo) -> bool {
        if self.kind.is_some_and(|kind| kind != model.kind) {
            return false;
        }
        if self.async_only && !model.supports_async {
            return false;
        }
        if self.sync_only && !model.supports_sync {
            return false;
        }

        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                model.model_id.to_lowercase().contains(&needle)
                    || model.display_name.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

/// Builds a catalog from adapters. The first adapter for a model id wins.
pub fn catalog_from_adapters<'a>(
    adapters: impl IntoIterator<Item = &'a Arc<dyn MediaAdapter>>,
) -> ModelCatalog {
    let mut models: Vec<ModelInfo> = Vec::new();

    for adapter in adapters {
        let info = adapter.model_info();
        if find_model_index(&models, &info.model_id).is_some() {
            continue;
        }
        models.push(info);
    }

    sort_models(&mut models);

    ModelCatalog { models }
}

pub fn builtin_model_catalog() -> ModelCatalog {
    catalog_from_adapters(&builtin_adapters())
}

pub fn filter_models(catalog: &ModelCatalog, filter: &ModelFilter) -> Vec<ModelInfo> {
    let mut models = catalog
        .models
        .iter()
        .filter(|model| filter.matches(model))
        .cloned()
        .collect::<Vec<_>>();
    sort_models(&mut models);
    models
}

pub fn find_model<'a>(catalog: &'a ModelCatalog, model_id: &str) -> Option<&'a ModelInfo> {
    let model_id = model_id.trim_start_matches('/');
    find_model_index(&catalog.models, model_id).map(|index| &catalog.models[index])
}

pub fn export_catalog_json(catalog: &ModelCatalog) -> Result<String, RuntimeError> {
    let mut normalized = catalog.clone();
    sort_models(&mut normalized.models);

    serde_json::to_string_pretty(&normalized).map_err(|error| {
        RuntimeError::from(UpstreamError::Serialization {
            model: None,
            message: error.to_string(),
        })
    })
}

fn find_model_index(models: &[ModelInfo], model_id: &str) -> Option<usize> {
    models
        .iter()
        .position(|candidate| candidate.model_id == model_id)
}

fn sort_models(models: &mut [ModelInfo]) {
    models.sort_by(|left, right| {
        kind_order(left.kind)
            .cmp(&kind_order(right.kind))
            .then_with(|| left.display_name.cmp(&right.display_name))
            .then_with(|| left.model_id.cmp(&right.model_id))
    });
}

fn kind_order(kind: MediaKind) -> u8 {
    match kind {
        MediaKind::Image => 0,
        MediaKind::Video => 1,
        MediaKind::Audio => 2,
        MediaKind::File => 3,
    }
}
