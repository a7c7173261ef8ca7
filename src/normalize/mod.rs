//! Shared helpers for turning raw upstream results into [`MediaResult`]s.
//!
//! All helpers are pure and ignore fields they do not recognize.

use serde_json::Value;

use crate::core::error::UpstreamError;
use crate::core::types::{MediaAsset, MediaKind, MediaResult};

/// Top-level fields whose presence marks a payload as a finished result.
pub const RESULT_FIELDS: [&str; 3] = ["video", "images", "output"];

pub fn has_result_fields(raw: &Value) -> bool {
    RESULT_FIELDS
        .iter()
        .any(|field| raw.get(field).is_some_and(|value| !value.is_null()))
}

/// Parses one file reference. Accepts either a bare URL string or an object
/// with at least a non-empty `url`.
pub fn parse_asset(kind: MediaKind, value: &Value) -> Option<MediaAsset> {
    if let Some(url) = value.as_str() {
        return non_empty(url).map(|url| MediaAsset {
            kind,
            url: url.to_string(),
            content_type: None,
            file_name: None,
            width: None,
            height: None,
            file_size: None,
        });
    }

    let url = value.get("url").and_then(Value::as_str).and_then(non_empty)?;
    Some(MediaAsset {
        kind,
        url: url.to_string(),
        content_type: string_field(value, "content_type"),
        file_name: string_field(value, "file_name"),
        width: u32_field(value, "width"),
        height: u32_field(value, "height"),
        file_size: value.get("file_size").and_then(Value::as_u64),
    })
}

pub fn video_asset(raw: &Value) -> Option<MediaAsset> {
    raw.get("video")
        .and_then(|video| parse_asset(MediaKind::Video, video))
}

/// Image assets from `images[]`, falling back to a single `image` object.
pub fn image_assets(raw: &Value) -> Vec<MediaAsset> {
    match raw.get("images").and_then(Value::as_array) {
        Some(images) => images
            .iter()
            .filter_map(|image| parse_asset(MediaKind::Image, image))
            .collect(),
        None => raw
            .get("image")
            .and_then(|image| parse_asset(MediaKind::Image, image))
            .into_iter()
            .collect(),
    }
}

pub fn seed(raw: &Value) -> Option<i64> {
    raw.get("seed").and_then(Value::as_i64)
}

pub fn normalize_video(model: &str, raw: &Value) -> Result<MediaResult, UpstreamError> {
    let video = video_asset(raw).ok_or_else(|| missing_field(model, "video.url"))?;

    Ok(MediaResult {
        model: model.to_string(),
        request_id: None,
        assets: vec![video],
        text: None,
        seed: seed(raw),
        raw: Some(raw.clone()),
    })
}

pub fn normalize_images(model: &str, raw: &Value) -> Result<MediaResult, UpstreamError> {
    let images = image_assets(raw);
    if images.is_empty() {
        return Err(missing_field(model, "images[].url"));
    }

    Ok(MediaResult {
        model: model.to_string(),
        request_id: None,
        assets: images,
        text: raw
            .get("prompt")
            .and_then(Value::as_str)
            .map(str::to_string),
        seed: seed(raw),
        raw: Some(raw.clone()),
    })
}

/// Normalizes a generic `output` result. String output becomes `text`;
/// structured output is rendered as JSON text and any file references in it
/// become assets.
pub fn normalize_output(model: &str, raw: &Value) -> Result<MediaResult, UpstreamError> {
    let output = raw
        .get("output")
        .filter(|value| !value.is_null())
        .ok_or_else(|| missing_field(model, "output"))?;

    let (text, assets) = match output {
        Value::String(text) => (Some(text.clone()), Vec::new()),
        other => {
            let mut assets: Vec<MediaAsset> = video_asset(other).into_iter().collect();
            assets.extend(image_assets(other));
            (Some(other.to_string()), assets)
        }
    };

    Ok(MediaResult {
        model: model.to_string(),
        request_id: None,
        assets,
        text,
        seed: seed(raw),
        raw: Some(raw.clone()),
    })
}

fn missing_field(model: &str, field: &str) -> UpstreamError {
    UpstreamError::MissingResultField {
        model: model.to_string(),
        field: field.to_string(),
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .and_then(non_empty)
        .map(str::to_string)
}

fn u32_field(value: &Value, field: &str) -> Option<u32> {
    value
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|number| u32::try_from(number).ok())
}

#[cfg(test)]
mod tests;
