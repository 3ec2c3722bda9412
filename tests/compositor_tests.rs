// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the frame compositor

mod common;

use common::{EndpointBehavior, FakeEndpoint, transform_client};
use image::{Rgba, RgbaImage};
use photobooth::app::{AiStyle, FilterSelection, LocalFilter};
use photobooth::backends::camera::{CameraFrame, FrameOrigin, SourceFrame};
use photobooth::config::ComposeConfig;
use photobooth::errors::{TemplateLoadError, TransformFailure};
use photobooth::pipelines::photo::{
    ComposeWarning, OverlayFit, OverlayLayer, PhotoPipeline, encoding,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

const RED: [u8; 4] = [220, 30, 30, 255];
const GREEN: [u8; 4] = [20, 200, 40, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn solid(width: u32, height: u32, color: [u8; 4]) -> SourceFrame {
    SourceFrame {
        frame: CameraFrame::from_rgba(RgbaImage::from_pixel(width, height, Rgba(color))),
        mirrored: false,
        origin: FrameOrigin::Camera,
    }
}

/// Left half red, right half blue
fn split(width: u32, height: u32, mirrored: bool) -> SourceFrame {
    let image = RgbaImage::from_fn(width, height, |x, _| {
        Rgba(if x < width / 2 { RED } else { BLUE })
    });
    SourceFrame {
        frame: CameraFrame::from_rgba(image),
        mirrored,
        origin: FrameOrigin::Camera,
    }
}

fn no_text() -> OverlayLayer {
    OverlayLayer::Captions {
        caption: String::new(),
        watermark: String::new(),
    }
}

fn close(actual: [u8; 4], expected: [u8; 4]) -> bool {
    actual
        .iter()
        .zip(expected.iter())
        .all(|(a, e)| (*a as i16 - *e as i16).abs() <= 2)
}

fn ai_pipeline(endpoint: Arc<FakeEndpoint>, timeout: Duration) -> PhotoPipeline {
    PhotoPipeline::new(
        ComposeConfig::default(),
        Some(Arc::new(transform_client(endpoint, timeout))),
    )
}

fn blue_endpoint() -> Arc<FakeEndpoint> {
    Arc::new(FakeEndpoint::new(EndpointBehavior::Solid {
        width: 64,
        height: 64,
        color: BLUE,
    }))
}

#[tokio::test]
async fn test_every_filter_keeps_source_dimensions() {
    let mut pipeline = ai_pipeline(blue_endpoint(), Duration::from_secs(5));
    let source = solid(96, 72, RED);

    for filter in FilterSelection::all() {
        let outcome = pipeline.compose(&source, filter, &no_text()).await.unwrap();
        let decoded = encoding::decode_rgba(&outcome.image.png).unwrap();
        assert_eq!(decoded.dimensions(), (96, 72), "filter {}", filter);
        assert_eq!((outcome.image.width, outcome.image.height), (96, 72));
        assert_eq!(outcome.image.filter, filter);
    }
}

#[tokio::test]
async fn test_opaque_overlay_wins() {
    let mut pipeline = PhotoPipeline::new(ComposeConfig::default(), None);
    // Left half transparent, right half opaque green
    let overlay = RgbaImage::from_fn(80, 60, |x, _| {
        if x < 40 { Rgba([0, 0, 0, 0]) } else { Rgba(GREEN) }
    });
    let layer = OverlayLayer::Image(Arc::new(overlay));

    let outcome = pipeline
        .compose(&solid(80, 60, RED), FilterSelection::PassThrough, &layer)
        .await
        .unwrap();
    let decoded = encoding::decode_rgba(&outcome.image.png).unwrap();

    assert_eq!(decoded.get_pixel(10, 30).0, RED);
    assert_eq!(decoded.get_pixel(70, 30).0, GREEN);
    assert!(outcome.warnings.is_empty());
}

#[tokio::test]
async fn test_overlay_drawn_after_local_filter() {
    let mut pipeline = PhotoPipeline::new(ComposeConfig::default(), None);
    let layer = OverlayLayer::Image(Arc::new(RgbaImage::from_pixel(40, 30, Rgba(GREEN))));

    let outcome = pipeline
        .compose(
            &solid(40, 30, RED),
            FilterSelection::Local(LocalFilter::Mono),
            &layer,
        )
        .await
        .unwrap();
    let decoded = encoding::decode_rgba(&outcome.image.png).unwrap();
    // Mono would have turned green gray if it ran after the overlay
    assert_eq!(decoded.get_pixel(20, 15).0, GREEN);
}

#[tokio::test]
async fn test_stretched_overlay_covers_surface() {
    let mut pipeline = PhotoPipeline::new(ComposeConfig::default(), None);
    let layer = OverlayLayer::Image(Arc::new(RgbaImage::from_pixel(10, 10, Rgba(GREEN))));

    let outcome = pipeline
        .compose(&solid(64, 48, RED), FilterSelection::PassThrough, &layer)
        .await
        .unwrap();
    let decoded = encoding::decode_rgba(&outcome.image.png).unwrap();
    for (x, y) in [(0, 0), (63, 0), (0, 47), (63, 47), (32, 24)] {
        assert!(close(decoded.get_pixel(x, y).0, GREEN), "pixel {},{}", x, y);
    }
}

#[tokio::test]
async fn test_contained_overlay_leaves_margins() {
    let config = ComposeConfig {
        overlay_fit: OverlayFit::Contain,
        ..ComposeConfig::default()
    };
    let mut pipeline = PhotoPipeline::new(config, None);
    let layer = OverlayLayer::Image(Arc::new(RgbaImage::from_pixel(48, 48, Rgba(GREEN))));

    let outcome = pipeline
        .compose(&solid(64, 48, RED), FilterSelection::PassThrough, &layer)
        .await
        .unwrap();
    let decoded = encoding::decode_rgba(&outcome.image.png).unwrap();
    assert_eq!(decoded.get_pixel(2, 24).0, RED);
    assert_eq!(decoded.get_pixel(32, 24).0, GREEN);
    assert_eq!(decoded.get_pixel(61, 24).0, RED);
}

#[tokio::test]
async fn test_mirror_is_deterministic_and_flips() {
    let mut pipeline = PhotoPipeline::new(ComposeConfig::default(), None);

    let first = pipeline
        .compose(&split(64, 32, true), FilterSelection::PassThrough, &no_text())
        .await
        .unwrap();
    let second = pipeline
        .compose(&split(64, 32, true), FilterSelection::PassThrough, &no_text())
        .await
        .unwrap();
    let plain = pipeline
        .compose(&split(64, 32, false), FilterSelection::PassThrough, &no_text())
        .await
        .unwrap();

    assert_eq!(first.image.png, second.image.png);
    assert_ne!(first.image.png, plain.image.png);

    let mirrored = encoding::decode_rgba(&first.image.png).unwrap();
    let unmirrored = encoding::decode_rgba(&plain.image.png).unwrap();
    assert_eq!(mirrored.get_pixel(0, 0).0, BLUE);
    assert_eq!(unmirrored.get_pixel(0, 0).0, RED);
}

#[tokio::test]
async fn test_mirror_does_not_touch_source_frame() {
    let mut pipeline = PhotoPipeline::new(ComposeConfig::default(), None);
    let source = split(16, 8, true);
    let before = source.frame.data.clone();

    pipeline
        .compose(&source, FilterSelection::PassThrough, &no_text())
        .await
        .unwrap();
    assert_eq!(source.frame.data, before);
}

#[tokio::test]
async fn test_ai_result_is_scaled_to_source_size() {
    let endpoint = blue_endpoint();
    let mut pipeline = ai_pipeline(endpoint.clone(), Duration::from_secs(5));

    let outcome = pipeline
        .compose(
            &solid(96, 72, RED),
            FilterSelection::Ai(AiStyle::Stylize),
            &no_text(),
        )
        .await
        .unwrap();
    assert!(outcome.warnings.is_empty());
    assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);

    let decoded = encoding::decode_rgba(&outcome.image.png).unwrap();
    assert_eq!(decoded.dimensions(), (96, 72));
    assert!(close(decoded.get_pixel(48, 36).0, BLUE));
}

#[tokio::test]
async fn test_ai_failure_falls_back_with_overlay() {
    let endpoint = Arc::new(FakeEndpoint::new(EndpointBehavior::Fail(
        TransformFailure::Network("connection refused".into()),
    )));
    let mut pipeline = ai_pipeline(endpoint, Duration::from_secs(5));
    let overlay = RgbaImage::from_fn(64, 48, |x, _| {
        if x < 32 { Rgba([0, 0, 0, 0]) } else { Rgba(GREEN) }
    });

    let outcome = pipeline
        .compose(
            &solid(64, 48, RED),
            FilterSelection::Ai(AiStyle::DeAge),
            &OverlayLayer::Image(Arc::new(overlay)),
        )
        .await
        .unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    match &outcome.warnings[0] {
        ComposeWarning::Transform(e) => {
            assert_eq!(e.style, AiStyle::DeAge);
            assert!(matches!(e.kind, TransformFailure::Network(_)));
        }
        other => panic!("unexpected warning {:?}", other),
    }

    let decoded = encoding::decode_rgba(&outcome.image.png).unwrap();
    assert_eq!(decoded.dimensions(), (64, 48));
    assert_eq!(decoded.get_pixel(5, 5).0, RED);
    assert_eq!(decoded.get_pixel(60, 5).0, GREEN);
}

#[tokio::test]
async fn test_ai_missing_field_is_transform_error() {
    let endpoint = Arc::new(FakeEndpoint::new(EndpointBehavior::Body(
        serde_json::json!({ "error": "model busy" }),
    )));
    let mut pipeline = ai_pipeline(endpoint, Duration::from_secs(5));

    let outcome = pipeline
        .compose(
            &solid(32, 24, RED),
            FilterSelection::Ai(AiStyle::Stylize),
            &no_text(),
        )
        .await
        .unwrap();
    assert!(matches!(
        &outcome.warnings[..],
        [ComposeWarning::Transform(e)] if e.kind == TransformFailure::MissingField("cartoonImage".into())
    ));
}

#[tokio::test]
async fn test_ai_timeout_is_transform_error() {
    let endpoint = blue_endpoint();
    endpoint.set_delay(Duration::from_secs(5));
    let mut pipeline = ai_pipeline(endpoint, Duration::from_millis(50));

    let outcome = pipeline
        .compose(
            &solid(32, 24, RED),
            FilterSelection::Ai(AiStyle::Stylize),
            &no_text(),
        )
        .await
        .unwrap();
    assert!(matches!(
        &outcome.warnings[..],
        [ComposeWarning::Transform(e)] if matches!(e.kind, TransformFailure::Timeout(_))
    ));
    let decoded = encoding::decode_rgba(&outcome.image.png).unwrap();
    assert_eq!(decoded.get_pixel(0, 0).0, RED);
}

#[tokio::test]
async fn test_ai_payload_is_capped() {
    let endpoint = blue_endpoint();
    let mut pipeline = ai_pipeline(endpoint.clone(), Duration::from_secs(10));

    let outcome = pipeline
        .compose(
            &solid(1600, 1200, RED),
            FilterSelection::Ai(AiStyle::Stylize),
            &no_text(),
        )
        .await
        .unwrap();
    assert_eq!((outcome.image.width, outcome.image.height), (1600, 1200));

    let (style, request) = endpoint.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(style, AiStyle::Stylize);
    let (mime, bytes) = encoding::parse_data_url(&request.image_data).unwrap();
    assert_eq!(mime, "image/jpeg");
    assert_eq!(
        encoding::decode_rgba(&bytes).unwrap().dimensions(),
        (1024, 768)
    );
}

#[tokio::test]
async fn test_unavailable_template_reports_and_continues() {
    let mut pipeline = PhotoPipeline::new(ComposeConfig::default(), None);
    let layer = OverlayLayer::Unavailable(TemplateLoadError {
        url: "https://cdn.example/t.png".into(),
        reason: "HTTP 404".into(),
    });

    let outcome = pipeline
        .compose(&solid(40, 30, RED), FilterSelection::PassThrough, &layer)
        .await
        .unwrap();
    assert!(matches!(
        &outcome.warnings[..],
        [ComposeWarning::Template(e)] if e.url == "https://cdn.example/t.png"
    ));
    let decoded = encoding::decode_rgba(&outcome.image.png).unwrap();
    assert_eq!(decoded.get_pixel(20, 15).0, RED);
}

#[tokio::test]
async fn test_captions_drawn_near_bottom_only() {
    let mut pipeline = PhotoPipeline::new(ComposeConfig::default(), None);
    let layer = OverlayLayer::Captions {
        caption: "HELLO EVENT".into(),
        watermark: "BOOTH".into(),
    };

    let outcome = pipeline
        .compose(&solid(640, 480, RED), FilterSelection::PassThrough, &layer)
        .await
        .unwrap();
    let decoded = encoding::decode_rgba(&outcome.image.png).unwrap();

    // Top half untouched
    for y in (0..240).step_by(16) {
        for x in (0..640).step_by(16) {
            assert_eq!(decoded.get_pixel(x, y).0, RED);
        }
    }
    // Something was drawn in the bottom band
    let changed = (380..480)
        .flat_map(|y| (0..640).map(move |x| (x, y)))
        .filter(|&(x, y)| decoded.get_pixel(x, y).0 != RED)
        .count();
    assert!(changed > 0);
}

#[tokio::test]
async fn test_surface_reuse_has_no_bleed_through() {
    let mut reused = PhotoPipeline::new(ComposeConfig::default(), None);
    let green = OverlayLayer::Image(Arc::new(RgbaImage::from_pixel(64, 48, Rgba(GREEN))));
    reused
        .compose(&solid(64, 48, RED), FilterSelection::PassThrough, &green)
        .await
        .unwrap();

    let transparent = RgbaImage::from_pixel(64, 48, Rgba([10, 10, 10, 0]));
    let second = reused
        .compose(
            &SourceFrame {
                frame: CameraFrame::from_rgba(transparent.clone()),
                mirrored: false,
                origin: FrameOrigin::Upload,
            },
            FilterSelection::PassThrough,
            &no_text(),
        )
        .await
        .unwrap();

    let mut fresh = PhotoPipeline::new(ComposeConfig::default(), None);
    let expected = fresh
        .compose(
            &SourceFrame {
                frame: CameraFrame::from_rgba(transparent),
                mirrored: false,
                origin: FrameOrigin::Upload,
            },
            FilterSelection::PassThrough,
            &no_text(),
        )
        .await
        .unwrap();

    assert_eq!(second.image.png, expected.image.png);
}
