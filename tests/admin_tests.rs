// SPDX-License-Identifier: MPL-2.0

//! Integration tests for moderation and booth administration

mod common;

use common::{Harness, camera, png_bytes};
use photobooth::BoothError;
use photobooth::backends::remote::SlideshowAnimation;
use photobooth::pipelines::publish::PublishReceipt;

const GRAY: [u8; 4] = [128, 128, 128, 255];

async fn publish_one(harness: &Harness) -> PublishReceipt {
    let mut session = harness.context.session(camera(320, 240, GRAY));
    session.start_camera().await.unwrap();
    session.capture().await.unwrap();
    session.publish().await.unwrap()
}

#[tokio::test]
async fn test_photos_listed_newest_first() {
    let harness = Harness::new().await;
    let first = publish_one(&harness).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = publish_one(&harness).await;

    let photos = harness.context.admin().photos().await.unwrap();
    let ids: Vec<_> = photos.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, vec![second.record.id, first.record.id]);
}

#[tokio::test]
async fn test_approval_can_be_revoked() {
    let harness = Harness::new().await;
    let admin = harness.context.admin();
    let receipt = publish_one(&harness).await;

    admin.set_approved(&receipt.record.id, true).await.unwrap();
    assert_eq!(admin.approved_photos().await.unwrap().len(), 1);

    admin.set_approved(&receipt.record.id, false).await.unwrap();
    assert!(admin.approved_photos().await.unwrap().is_empty());
    assert_eq!(admin.photos().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_photo_removes_object_and_row() {
    let harness = Harness::new().await;
    let admin = harness.context.admin();
    let keep = publish_one(&harness).await;
    let gone = publish_one(&harness).await;

    admin.delete_photo(&gone.record.id).await.unwrap();

    assert_eq!(harness.assets.names(), vec![keep.file_name.clone()]);
    let photos = admin.photos().await.unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].id, keep.record.id);
}

#[tokio::test]
async fn test_delete_unknown_photo_fails() {
    let harness = Harness::new().await;
    let err = harness
        .context
        .admin()
        .delete_photo("no-such-id")
        .await
        .unwrap_err();
    assert!(matches!(err, BoothError::Backend(_)));
}

#[tokio::test]
async fn test_delete_all_keeps_templates() {
    let harness = Harness::new().await;
    let admin = harness.context.admin();
    let template = admin
        .upload_template("frame", png_bytes(32, 24, [0, 0, 0, 0]))
        .await
        .unwrap();
    let template_object = template.image_url.rsplit('/').next().unwrap().to_string();

    publish_one(&harness).await;
    publish_one(&harness).await;
    assert_eq!(harness.assets.names().len(), 3);

    let removed = admin.delete_all_photos().await.unwrap();
    assert_eq!(removed, 2);
    assert!(admin.photos().await.unwrap().is_empty());
    assert_eq!(harness.assets.names(), vec![template_object]);
    assert_eq!(admin.templates().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_settings_round_trip() {
    let harness = Harness::new().await;
    let admin = harness.context.admin();

    let mut settings = admin.settings().await.unwrap();
    settings.event_name = Some("Launch Party".into());
    settings.slideshow_duration = 8;
    settings.slideshow_animation = SlideshowAnimation::Zoom;
    let saved = admin.save_settings(settings).await.unwrap();
    assert!(saved.updated_at.is_some());

    let loaded = admin.settings().await.unwrap();
    assert_eq!(loaded.event_name.as_deref(), Some("Launch Party"));
    assert_eq!(loaded.slideshow_duration, 8);
    assert_eq!(loaded.slideshow_animation, SlideshowAnimation::Zoom);
}

#[tokio::test]
async fn test_zero_slideshow_duration_rejected() {
    let harness = Harness::new().await;
    let admin = harness.context.admin();

    let mut settings = admin.settings().await.unwrap();
    settings.slideshow_duration = 0;
    assert!(matches!(
        admin.save_settings(settings).await,
        Err(BoothError::Config(_))
    ));
    assert_eq!(admin.settings().await.unwrap().slideshow_duration, 5);
}

#[tokio::test]
async fn test_activate_switches_active_template() {
    let harness = Harness::new().await;
    let admin = harness.context.admin();

    let first = admin
        .upload_template("first", png_bytes(8, 8, GRAY))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = admin
        .upload_template("second", png_bytes(8, 8, GRAY))
        .await
        .unwrap();

    admin.activate_template(&first.id).await.unwrap();
    let templates = admin.templates().await.unwrap();
    let active: Vec<_> = templates.iter().filter(|t| t.active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, first.id);
    assert_ne!(active[0].id, second.id);

    assert!(admin.activate_template("missing").await.is_err());
}
