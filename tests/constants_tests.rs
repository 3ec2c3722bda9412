// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use photobooth::constants::{AspectRatio, camera, file_formats, transform};

#[test]
fn test_aspect_ratio_values() {
    // Test that all ratios exist
    assert_eq!(AspectRatio::ALL.len(), 4);
    assert_eq!(AspectRatio::default(), AspectRatio::FourThree);
}

#[test]
fn test_resolutions_match_ratio() {
    for ratio in AspectRatio::ALL {
        let (w, h) = ratio.resolution_for_long_edge(camera::DEFAULT_LONG_EDGE);
        assert_eq!(w.max(h), camera::DEFAULT_LONG_EDGE);
        let delivered = w as f64 / h as f64;
        assert!(
            (delivered - ratio.ratio()).abs() < 0.01,
            "{} gave {}x{}",
            ratio.display_name(),
            w,
            h
        );
    }
}

#[test]
fn test_safe_resolution_is_smaller() {
    assert!(camera::SAFE_LONG_EDGE < camera::DEFAULT_LONG_EDGE);
    assert_eq!(
        AspectRatio::FourThree.resolution_for_long_edge(camera::SAFE_LONG_EDGE),
        (640, 480)
    );
}

#[test]
fn test_timeouts() {
    assert_eq!(camera::READY_TIMEOUT.as_secs(), 5);
    assert!(transform::TIMEOUT > camera::READY_TIMEOUT);
    assert!((camera::ASPECT_TOLERANCE - 0.1).abs() < f64::EPSILON);
}

#[test]
fn test_image_extensions() {
    assert!(file_formats::is_image_extension("PNG"));
    assert!(file_formats::is_image_extension("jpeg"));
    assert!(!file_formats::is_image_extension("dng"));
}
