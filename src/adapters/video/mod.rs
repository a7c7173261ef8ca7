use serde_json::{Map, Value, json};

use crate::adapters::{invalid_parameter, merge_extra, require_prompt};
use crate::core::error::{ConfigError, UpstreamError};
use crate::core::traits::MediaAdapter;
use crate::core::types::{AdapterCapabilities, GenerationParams, MediaKind, MediaResult};
use crate::normalize::normalize_video;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    TextToVideo,
    ImageToVideo,
}

/// How a model expects `duration` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationFormat {
    /// `"5"`
    Seconds,
    /// `"8s"`
    SecondsSuffix,
    /// Model has a fixed length and rejects the field.
    Fixed,
}

/// Queue-only video generation model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAdapter {
    model_id: String,
    display_name: String,
    mode: VideoMode,
    durations: &'static [u32],
    duration_format: DurationFormat,
    aspect_ratios: &'static [&'static str],
    supports_negative_prompt: bool,
}

impl VideoAdapter {
    pub fn new(
        model_id: impl Into<String>,
        display_name: impl Into<String>,
        mode: VideoMode,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            display_name: display_name.into(),
            mode,
            durations: &[],
            duration_format: DurationFormat::Fixed,
            aspect_ratios: &[],
            supports_negative_prompt: false,
        }
    }

    pub fn with_durations(mut self, durations: &'static [u32], format: DurationFormat) -> Self {
        self.durations = durations;
        self.duration_format = format;
        self
    }

    pub fn with_aspect_ratios(mut self, aspect_ratios: &'static [&'static str]) -> Self {
        self.aspect_ratios = aspect_ratios;
        self
    }

    pub fn with_negative_prompt(mut self) -> Self {
        self.supports_negative_prompt = true;
        self
    }

    pub fn mode(&self) -> VideoMode {
        self.mode
    }

    pub fn kling_text_to_video() -> Self {
        Self::new(
            "fal-ai/kling-video/v2/master/text-to-video",
            "Kling 2.0 Master (text to video)",
            VideoMode::TextToVideo,
        )
        .with_durations(&[5, 10], DurationFormat::Seconds)
        .with_aspect_ratios(&["16:9", "9:16", "1:1"])
        .with_negative_prompt()
    }

    pub fn kling_image_to_video() -> Self {
        Self::new(
            "fal-ai/kling-video/v2/master/image-to-video",
            "Kling 2.0 Master (image to video)",
            VideoMode::ImageToVideo,
        )
        .with_durations(&[5, 10], DurationFormat::Seconds)
        .with_negative_prompt()
    }

    pub fn minimax_hailuo() -> Self {
        Self::new(
            "fal-ai/minimax/hailuo-02/standard/text-to-video",
            "MiniMax Hailuo 02",
            VideoMode::TextToVideo,
        )
        .with_durations(&[6, 10], DurationFormat::Seconds)
    }

    pub fn veo3() -> Self {
        Self::new("fal-ai/veo3", "Google Veo 3", VideoMode::TextToVideo)
            .with_durations(&[8], DurationFormat::SecondsSuffix)
            .with_aspect_ratios(&["16:9", "9:16", "1:1"])
            .with_negative_prompt()
    }

    pub fn seedance_image_to_video() -> Self {
        Self::new(
            "fal-ai/bytedance/seedance/v1/pro/image-to-video",
            "Seedance 1.0 Pro (image to video)",
            VideoMode::ImageToVideo,
        )
        .with_durations(&[5, 10], DurationFormat::Seconds)
    }

    fn parameter_error(&self, parameter: &str, reason: impl Into<String>) -> ConfigError {
        invalid_parameter(&self.model_id, parameter, reason)
    }
}

impl MediaAdapter for VideoAdapter {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            supports_async: true,
            supports_sync: false,
            output: MediaKind::Video,
        }
    }

    fn build_payload(&self, params: &GenerationParams) -> Result<Map<String, Value>, ConfigError> {
        let prompt = require_prompt(&self.model_id, params)?;
        let mut payload = Map::new();
        payload.insert("prompt".to_string(), json!(prompt));

        match (self.mode, params.image_url.as_deref().map(str::trim)) {
            (VideoMode::ImageToVideo, Some(url)) if !url.is_empty() => {
                payload.insert("image_url".to_string(), json!(url));
            }
            (VideoMode::ImageToVideo, _) => {
                return Err(self.parameter_error("image_url", "required for image to video"));
            }
            (VideoMode::TextToVideo, Some(_)) => {
                return Err(self.parameter_error("image_url", "not supported for text to video"));
            }
            (VideoMode::TextToVideo, None) => {}
        }

        if let Some(duration) = params.duration_seconds {
            if !self.durations.contains(&duration) {
                return Err(self.parameter_error(
                    "duration_seconds",
                    format!("must be one of {:?}", self.durations),
                ));
            }
            match self.duration_format {
                DurationFormat::Seconds => {
                    payload.insert("duration".to_string(), json!(duration.to_string()));
                }
                DurationFormat::SecondsSuffix => {
                    payload.insert("duration".to_string(), json!(format!("{duration}s")));
                }
                DurationFormat::Fixed => {}
            }
        }

        if let Some(aspect_ratio) = &params.aspect_ratio {
            if !self.aspect_ratios.contains(&aspect_ratio.as_str()) {
                return Err(self.parameter_error(
                    "aspect_ratio",
                    format!("must be one of {:?}", self.aspect_ratios),
                ));
            }
            payload.insert("aspect_ratio".to_string(), json!(aspect_ratio));
        }

        if let Some(negative_prompt) = &params.negative_prompt {
            if !self.supports_negative_prompt {
                return Err(self.parameter_error("negative_prompt", "not supported"));
            }
            payload.insert("negative_prompt".to_string(), json!(negative_prompt));
        }

        if params.num_images.is_some() {
            return Err(self.parameter_error("num_images", "not supported for video"));
        }
        if let Some(seed) = params.seed {
            payload.insert("seed".to_string(), json!(seed));
        }

        merge_extra(&mut payload, &params.extra);
        Ok(payload)
    }

    fn normalize(&self, raw: &Value) -> Result<MediaResult, UpstreamError> {
        normalize_video(&self.model_id, raw)
    }
}
