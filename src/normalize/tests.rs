use serde_json::json;

use super::*;

#[test]
fn test_has_result_fields() {
    assert!(has_result_fields(&json!({"video": {"url": "https://x/y.mp4"}})));
    assert!(has_result_fields(&json!({"images": []})));
    assert!(has_result_fields(&json!({"output": "done"})));
    assert!(!has_result_fields(&json!({"status": "COMPLETED"})));
    assert!(!has_result_fields(&json!({"video": null})));
    assert!(!has_result_fields(&json!("COMPLETED")));
}

#[test]
fn test_normalize_video_extracts_file_metadata_and_ignores_unknowns() {
    let raw = json!({
        "video": {
            "url": "https://x/y.mp4",
            "content_type": "video/mp4",
            "file_name": "y.mp4",
            "file_size": 1_048_576,
            "unexpected": true
        },
        "seed": 42,
        "timings": {"inference": 12.5}
    });

    let result = normalize_video("fal-ai/veo3", &raw).expect("normalize");
    assert_eq!(result.model, "fal-ai/veo3");
    assert_eq!(result.first_url(), Some("https://x/y.mp4"));
    assert_eq!(result.seed, Some(42));
    let video = &result.assets[0];
    assert_eq!(video.kind, MediaKind::Video);
    assert_eq!(video.content_type.as_deref(), Some("video/mp4"));
    assert_eq!(video.file_name.as_deref(), Some("y.mp4"));
    assert_eq!(video.file_size, Some(1_048_576));
    assert_eq!(result.raw.as_ref(), Some(&raw));
}

#[test]
fn test_normalize_video_requires_url() {
    let error = normalize_video("fal-ai/veo3", &json!({"video": {"content_type": "video/mp4"}}))
        .expect_err("url is mandatory");
    assert_eq!(
        error,
        UpstreamError::MissingResultField {
            model: "fal-ai/veo3".to_string(),
            field: "video.url".to_string(),
        }
    );
}

#[test]
fn test_normalize_images_collects_every_url() {
    let raw = json!({
        "images": [
            {"url": "https://x/1.png", "width": 1024, "height": 768, "content_type": "image/png"},
            {"url": ""},
            "https://x/2.jpg"
        ],
        "prompt": "a red fox",
        "has_nsfw_concepts": [false, false]
    });

    let result = normalize_images("fal-ai/flux/dev", &raw).expect("normalize");
    let urls: Vec<&str> = result.assets.iter().map(|asset| asset.url.as_str()).collect();
    assert_eq!(urls, vec!["https://x/1.png", "https://x/2.jpg"]);
    assert_eq!(result.assets[0].width, Some(1024));
    assert_eq!(result.assets[0].height, Some(768));
    assert_eq!(result.text.as_deref(), Some("a red fox"));
}

#[test]
fn test_normalize_images_accepts_single_image_field() {
    let raw = json!({"image": {"url": "https://x/edit.png"}});
    let result = normalize_images("fal-ai/flux-pro/kontext", &raw).expect("normalize");
    assert_eq!(result.first_url(), Some("https://x/edit.png"));

    let error = normalize_images("fal-ai/flux/dev", &json!({"images": []})).expect_err("empty");
    assert!(matches!(error, UpstreamError::MissingResultField { .. }));
}

#[test]
fn test_normalize_output_handles_text_and_structured_values() {
    let text = normalize_output("fal-ai/any-llm", &json!({"output": "hello"})).expect("text");
    assert_eq!(text.text.as_deref(), Some("hello"));
    assert!(text.assets.is_empty());

    let structured = normalize_output(
        "fal-ai/workflow",
        &json!({"output": {"video": {"url": "https://x/v.mp4"}}}),
    )
    .expect("structured");
    assert_eq!(structured.first_url(), Some("https://x/v.mp4"));
    assert_eq!(
        structured.text.as_deref(),
        Some(r#"{"video":{"url":"https://x/v.mp4"}}"#)
    );

    assert!(normalize_output("fal-ai/any-llm", &json!({"output": null})).is_err());
}
