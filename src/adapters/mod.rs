use std::sync::Arc;

use serde_json::{Map, Value};

use crate::core::error::ConfigError;
use crate::core::traits::MediaAdapter;
use crate::core::types::GenerationParams;

pub mod image;
pub mod video;

pub use image::{ImageAdapter, SizeField};
pub use video::{DurationFormat, VideoAdapter, VideoMode};

/// Adapters for the models this crate ships definitions for.
pub fn builtin_adapters() -> Vec<Arc<dyn MediaAdapter>> {
    vec![
        Arc::new(ImageAdapter::flux_schnell()),
        Arc::new(ImageAdapter::flux_dev()),
        Arc::new(ImageAdapter::flux_pro_ultra()),
        Arc::new(ImageAdapter::flux_kontext_edit()),
        Arc::new(VideoAdapter::kling_text_to_video()),
        Arc::new(VideoAdapter::kling_image_to_video()),
        Arc::new(VideoAdapter::minimax_hailuo()),
        Arc::new(VideoAdapter::veo3()),
        Arc::new(VideoAdapter::seedance_image_to_video()),
    ]
}

pub(crate) fn require_prompt<'a>(
    model: &str,
    params: &'a GenerationParams,
) -> Result<&'a str, ConfigError> {
    let prompt = params.prompt.trim();
    if prompt.is_empty() {
        return Err(invalid_parameter(model, "prompt", "must not be empty"));
    }
    Ok(prompt)
}

pub(crate) fn invalid_parameter(
    model: &str,
    parameter: &str,
    reason: impl Into<String>,
) -> ConfigError {
    ConfigError::InvalidParameter {
        model: model.to_string(),
        parameter: parameter.to_string(),
        reason: reason.into(),
    }
}

/// Copies caller-provided passthrough fields over the typed payload.
pub(crate) fn merge_extra(payload: &mut Map<String, Value>, extra: &Map<String, Value>) {
    for (key, value) in extra {
        payload.insert(key.clone(), value.clone());
    }
}
