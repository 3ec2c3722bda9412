// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for booth operations
//!
//! This module provides command-line functionality for:
//! - Composing a photo from an image file
//! - Listing the cameras attached to this machine
//! - Running a booth session against a real or virtual camera
//! - Moderating photos, editing settings and managing templates

use clap::Subcommand;
use photobooth::app::{BoothContext, CaptureCompletion, FilterSelection, TemplateConfig};
use photobooth::backends::camera::{
    CameraBackend, FacingMode, FrameOrigin, SourceFrame, V4l2Backend,
};
use photobooth::backends::remote::{BoothSettings, SlideshowAnimation};
use photobooth::backends::virtual_camera::{
    self, VirtualCameraBackend, VirtualDevice, test_pattern,
};
use photobooth::config::Config;
use photobooth::pipelines::photo::{OverlayLayer, PhotoPipeline};
use photobooth::pipelines::transform::TransformClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type CliResult = Result<(), Box<dyn std::error::Error>>;

pub struct ComposeArgs {
    pub input: PathBuf,
    pub filter: FilterSelection,
    pub overlay: Option<PathBuf>,
    pub mirror: bool,
    pub caption: Option<String>,
    pub watermark: Option<String>,
    pub output: PathBuf,
}

pub struct BoothArgs {
    pub source: Option<PathBuf>,
    pub virtual_camera: bool,
    pub filter: FilterSelection,
    pub facing: Option<FacingMode>,
    pub toggle_mirror: bool,
    pub publish: bool,
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum PhotosAction {
    /// List photos, newest first
    List {
        /// Only photos visible in the feed
        #[arg(long)]
        approved: bool,
    },
    /// Show a photo in the feed
    Approve {
        id: String,
        /// Hide it again instead
        #[arg(long)]
        revoke: bool,
    },
    /// Delete one photo and its stored image
    Delete { id: String },
    /// Delete every photo (templates are kept)
    DeleteAll {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the settings row
    Show,
    /// Change fields of the settings row
    Set {
        #[arg(long)]
        event_name: Option<String>,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        watermark: Option<String>,
        /// Overlay URL used when no template is active (empty string clears it)
        #[arg(long)]
        template_url: Option<String>,
        /// Seconds per slide
        #[arg(long)]
        slideshow_duration: Option<u32>,
        /// fade, slide or zoom
        #[arg(long)]
        slideshow_animation: Option<SlideshowAnimation>,
        #[arg(long)]
        slideshow_caption: Option<bool>,
    },
}

#[derive(Subcommand)]
pub enum TemplateAction {
    /// List templates, newest first
    List,
    /// Upload an overlay image and make it active
    Upload {
        path: PathBuf,
        /// Display name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Make an existing template the active one
    Activate { id: String },
    /// Print the overlay the booth would use right now
    Active,
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
}

/// Compose one photo from a file, without any backend
pub fn compose(config: Config, args: ComposeArgs) -> CliResult {
    let frame = virtual_camera::load_image_as_frame(&args.input)?;
    println!("Source: {}x{}", frame.width, frame.height);

    let layer = match &args.overlay {
        Some(path) => {
            let overlay = image::open(path)?.to_rgba8();
            println!("Overlay: {} ({}x{})", path.display(), overlay.width(), overlay.height());
            OverlayLayer::Image(Arc::new(overlay))
        }
        None => TemplateConfig {
            caption: args.caption,
            watermark: args.watermark,
            ..Default::default()
        }
        .text_layer(),
    };

    let transform = if args.filter.is_ai() {
        TransformClient::from_config(&config.backend, &config.transform).map(Arc::new)
    } else {
        None
    };
    let mut pipeline = PhotoPipeline::new(config.compose.clone(), transform);

    let source = SourceFrame {
        frame,
        mirrored: args.mirror,
        origin: FrameOrigin::Upload,
    };

    let rt = runtime()?;
    let outcome = rt.block_on(pipeline.compose(&source, args.filter, &layer))?;
    for warning in &outcome.warnings {
        println!("Warning: {}", warning);
    }

    write_png(&args.output, &outcome.image.png)?;
    println!(
        "Saved {}x{} ({}) to {}",
        outcome.image.width,
        outcome.image.height,
        outcome.image.filter,
        args.output.display()
    );
    Ok(())
}

/// Print the capture devices and the facing mode each one serves
pub fn list_cameras(config: Config) -> CliResult {
    let backend = V4l2Backend::discover(&config.camera);
    if !backend.is_available() {
        println!("No cameras found");
        return Ok(());
    }
    for device in backend.devices() {
        let modes: Vec<String> = device
            .modes
            .iter()
            .map(|(w, h)| format!("{}x{}", w, h))
            .collect();
        println!(
            "{:<12} {:<12} {:<24} {}",
            device.path,
            device.facing,
            device.card,
            modes.join(" ")
        );
    }
    Ok(())
}

/// Hardware camera unless a virtual one was asked for
fn booth_camera(
    config: &Config,
    args: &BoothArgs,
) -> Result<Arc<dyn CameraBackend>, Box<dyn std::error::Error>> {
    if args.source.is_none() && !args.virtual_camera {
        let backend = V4l2Backend::discover(&config.camera);
        if !backend.is_available() {
            return Err("no camera found; pass --virtual-camera or --source".into());
        }
        return Ok(Arc::new(backend));
    }

    let source = match &args.source {
        Some(path) => image::open(path)?.to_rgba8(),
        None => test_pattern(1280, 960),
    };
    Ok(Arc::new(VirtualCameraBackend::new(source).with_devices(vec![
        VirtualDevice::new(FacingMode::User, &[(1280, 960), (1280, 720), (640, 480)]),
        VirtualDevice::new(FacingMode::Environment, &[(1920, 1080), (1280, 720)]),
    ])))
}

/// One full session: camera on, capture, review, optionally publish
pub fn run_booth(mut config: Config, args: BoothArgs) -> CliResult {
    if let Some(facing) = args.facing {
        config.camera.facing = facing;
    }
    let backend = booth_camera(&config, &args)?;

    let rt = runtime()?;
    rt.block_on(async move {
        let context = BoothContext::connect(config).await?;
        let mut session = context.session(backend);

        let stream = session.start_camera().await?;
        println!(
            "Camera: {}x{} ({})",
            stream.width,
            stream.height,
            stream.facing.map(|f| f.to_string()).unwrap_or_default()
        );

        if args.toggle_mirror {
            let mirrored = session.toggle_mirror()?;
            println!("Mirror: {}", if mirrored { "on" } else { "off" });
        }
        session.select_filter(args.filter)?;

        match session.capture().await? {
            CaptureCompletion::Accepted { warnings } => {
                for warning in warnings {
                    println!("Warning: {}", warning);
                }
            }
            CaptureCompletion::Stale => return Err("capture was superseded".into()),
        }

        let image = session.review().ok_or("no photo to review")?;
        println!(
            "Captured {}x{} with filter {}",
            image.width, image.height, image.filter
        );
        if let Some(path) = &args.output {
            write_png(path, &image.png)?;
            println!("Saved composed photo to {}", path.display());
        }

        if args.publish {
            let receipt = session.publish().await?;
            println!("Published: {}", receipt.public_url);
            match &receipt.download {
                Ok(path) => println!("Local copy: {}", path.display()),
                Err(e) => println!("Saved online, but the local copy failed: {}", e),
            }
        }

        session.shutdown();
        context.shutdown();
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}

pub fn photos(config: Config, action: PhotosAction) -> CliResult {
    let rt = runtime()?;
    rt.block_on(async move {
        let context = BoothContext::connect(config).await?;
        let admin = context.admin();

        match action {
            PhotosAction::List { approved } => {
                let photos = if approved {
                    admin.approved_photos().await?
                } else {
                    admin.photos().await?
                };
                if photos.is_empty() {
                    println!("No photos.");
                }
                for photo in photos {
                    println!(
                        "{}  {}  {}  {}",
                        photo.id,
                        photo.created_at.format("%Y-%m-%d %H:%M:%S"),
                        if photo.approved { "approved" } else { "pending " },
                        photo.image_url
                    );
                }
            }
            PhotosAction::Approve { id, revoke } => {
                admin.set_approved(&id, !revoke).await?;
                println!("{} {}", id, if revoke { "hidden" } else { "approved" });
            }
            PhotosAction::Delete { id } => {
                admin.delete_photo(&id).await?;
                println!("Deleted {}", id);
            }
            PhotosAction::DeleteAll { yes } => {
                if !yes {
                    return Err("refusing to delete every photo without --yes".into());
                }
                let removed = admin.delete_all_photos().await?;
                println!("Deleted all photos ({} stored images removed)", removed);
            }
        }

        context.shutdown();
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}

pub fn settings(config: Config, action: SettingsAction) -> CliResult {
    let rt = runtime()?;
    rt.block_on(async move {
        let context = BoothContext::connect(config).await?;
        let admin = context.admin();

        match action {
            SettingsAction::Show => print_settings(&admin.settings().await?),
            SettingsAction::Set {
                event_name,
                caption,
                watermark,
                template_url,
                slideshow_duration,
                slideshow_animation,
                slideshow_caption,
            } => {
                let mut settings = admin.settings().await?;
                if let Some(v) = event_name {
                    settings.event_name = Some(v);
                }
                if let Some(v) = caption {
                    settings.caption = Some(v);
                }
                if let Some(v) = watermark {
                    settings.watermark = Some(v);
                }
                if let Some(v) = template_url {
                    settings.template_image_url = (!v.is_empty()).then_some(v);
                }
                if let Some(v) = slideshow_duration {
                    settings.slideshow_duration = v;
                }
                if let Some(v) = slideshow_animation {
                    settings.slideshow_animation = v;
                }
                if let Some(v) = slideshow_caption {
                    settings.slideshow_caption_enabled = v;
                }
                print_settings(&admin.save_settings(settings).await?);
            }
        }

        context.shutdown();
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}

pub fn template(config: Config, action: TemplateAction) -> CliResult {
    let rt = runtime()?;
    rt.block_on(async move {
        let context = BoothContext::connect(config).await?;
        let admin = context.admin();

        match action {
            TemplateAction::List => {
                let templates = admin.templates().await?;
                if templates.is_empty() {
                    println!("No templates.");
                }
                for t in templates {
                    println!(
                        "{}  {}  {}  {}",
                        t.id,
                        if t.active { "*" } else { " " },
                        t.name,
                        t.image_url
                    );
                }
            }
            TemplateAction::Upload { path, name } => {
                let bytes = tokio::fs::read(&path).await?;
                let name = name.unwrap_or_else(|| display_name(&path));
                let record = admin.upload_template(&name, bytes).await?;
                println!("Active template: {} ({})", record.name, record.image_url);
            }
            TemplateAction::Activate { id } => {
                admin.activate_template(&id).await?;
                println!("Activated {}", id);
            }
            TemplateAction::Active => {
                let active = context.templates.refresh().await?;
                match active.fetch_url() {
                    Some(url) => println!("Overlay: {}", url),
                    None => {
                        println!("Caption: {}", active.caption_line());
                        println!("Watermark: {}", active.watermark_line());
                    }
                }
            }
        }

        context.shutdown();
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}

fn print_settings(settings: &BoothSettings) {
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    println!("Event name:     {}", show(&settings.event_name));
    println!("Caption:        {}", show(&settings.caption));
    println!("Watermark:      {}", show(&settings.watermark));
    println!("Template URL:   {}", show(&settings.template_image_url));
    println!("Slide duration: {}s", settings.slideshow_duration);
    println!("Animation:      {:?}", settings.slideshow_animation);
    println!("Slide caption:  {}", settings.slideshow_caption_enabled);
    if let Some(at) = settings.updated_at {
        println!("Updated:        {}", at.to_rfc3339());
    }
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "template".to_string())
}

fn write_png(path: &Path, png: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, png)
}
