use serde_json::{Map, Value, json};

use crate::adapters::{invalid_parameter, merge_extra, require_prompt};
use crate::core::error::{ConfigError, UpstreamError};
use crate::core::traits::MediaAdapter;
use crate::core::types::{AdapterCapabilities, GenerationParams, MediaKind, MediaResult};
use crate::normalize::normalize_images;

/// Which request field carries the requested framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeField {
    /// `image_size` preset names such as `landscape_16_9`.
    ImageSize,
    /// `aspect_ratio` passed through as `16:9`.
    AspectRatio,
}

/// Image generation model; runs on both the queue and the sync endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAdapter {
    model_id: String,
    display_name: String,
    max_images: u32,
    size_field: SizeField,
    requires_image_input: bool,
    supports_negative_prompt: bool,
}

impl ImageAdapter {
    pub fn new(model_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            display_name: display_name.into(),
            max_images: 1,
            size_field: SizeField::ImageSize,
            requires_image_input: false,
            supports_negative_prompt: false,
        }
    }

    pub fn with_max_images(mut self, max_images: u32) -> Self {
        self.max_images = max_images.max(1);
        self
    }

    pub fn with_size_field(mut self, size_field: SizeField) -> Self {
        self.size_field = size_field;
        self
    }

    pub fn with_image_input(mut self) -> Self {
        self.requires_image_input = true;
        self
    }

    pub fn with_negative_prompt(mut self) -> Self {
        self.supports_negative_prompt = true;
        self
    }

    pub fn flux_schnell() -> Self {
        Self::new("fal-ai/flux/schnell", "FLUX.1 [schnell]").with_max_images(4)
    }

    pub fn flux_dev() -> Self {
        Self::new("fal-ai/flux/dev", "FLUX.1 [dev]").with_max_images(4)
    }

    pub fn flux_pro_ultra() -> Self {
        Self::new("fal-ai/flux-pro/v1.1-ultra", "FLUX1.1 [pro] ultra")
            .with_max_images(4)
            .with_size_field(SizeField::AspectRatio)
    }

    pub fn flux_kontext_edit() -> Self {
        Self::new("fal-ai/flux-pro/kontext", "FLUX.1 Kontext [pro] (edit)")
            .with_size_field(SizeField::AspectRatio)
            .with_image_input()
    }

    fn parameter_error(&self, parameter: &str, reason: impl Into<String>) -> ConfigError {
        invalid_parameter(&self.model_id, parameter, reason)
    }
}

/// Maps an aspect ratio to the upstream `image_size` preset.
pub fn image_size_preset(aspect_ratio: &str) -> Option<&'static str> {
    match aspect_ratio {
        "1:1" => Some("square_hd"),
        "4:3" => Some("landscape_4_3"),
        "16:9" => Some("landscape_16_9"),
        "3:4" => Some("portrait_4_3"),
        "9:16" => Some("portrait_16_9"),
        _ => None,
    }
}

impl MediaAdapter for ImageAdapter {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            supports_async: true,
            supports_sync: true,
            output: MediaKind::Image,
        }
    }

    fn build_payload(&self, params: &GenerationParams) -> Result<Map<String, Value>, ConfigError> {
        let prompt = require_prompt(&self.model_id, params)?;
        let mut payload = Map::new();
        payload.insert("prompt".to_string(), json!(prompt));

        match params.image_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() && self.requires_image_input => {
                payload.insert("image_url".to_string(), json!(url));
            }
            _ if self.requires_image_input => {
                return Err(self.parameter_error("image_url", "required for image editing"));
            }
            Some(_) => {
                return Err(self.parameter_error("image_url", "not supported"));
            }
            None => {}
        }

        if let Some(num_images) = params.num_images {
            if num_images == 0 || num_images > self.max_images {
                return Err(self.parameter_error(
                    "num_images",
                    format!("must be between 1 and {}", self.max_images),
                ));
            }
            payload.insert("num_images".to_string(), json!(num_images));
        }

        if let Some(aspect_ratio) = &params.aspect_ratio {
            match self.size_field {
                SizeField::ImageSize => {
                    let preset = image_size_preset(aspect_ratio).ok_or_else(|| {
                        self.parameter_error("aspect_ratio", "unsupported aspect ratio")
                    })?;
                    payload.insert("image_size".to_string(), json!(preset));
                }
                SizeField::AspectRatio => {
                    if image_size_preset(aspect_ratio).is_none() {
                        return Err(
                            self.parameter_error("aspect_ratio", "unsupported aspect ratio")
                        );
                    }
                    payload.insert("aspect_ratio".to_string(), json!(aspect_ratio));
                }
            }
        }

        if let Some(negative_prompt) = &params.negative_prompt {
            if !self.supports_negative_prompt {
                return Err(self.parameter_error("negative_prompt", "not supported"));
            }
            payload.insert("negative_prompt".to_string(), json!(negative_prompt));
        }

        if params.duration_seconds.is_some() {
            return Err(self.parameter_error("duration_seconds", "not supported for images"));
        }
        if let Some(seed) = params.seed {
            payload.insert("seed".to_string(), json!(seed));
        }

        merge_extra(&mut payload, &params.extra);
        Ok(payload)
    }

    fn normalize(&self, raw: &Value) -> Result<MediaResult, UpstreamError> {
        normalize_images(&self.model_id, raw)
    }
}
