// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use photobooth::app::FilterSelection;
use photobooth::backends::camera::FacingMode;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "photobooth")]
#[command(about = "Event photo booth: capture, compose and publish")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.config/photobooth/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose one photo from an image file
    Compose {
        /// Source image
        #[arg(short, long)]
        input: PathBuf,

        /// Filter (original, mono, sepia, ..., stylize, de-age)
        #[arg(short, long, default_value = "original")]
        filter: FilterSelection,

        /// Overlay image drawn on top (caption mode when omitted)
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Flip the source horizontally
        #[arg(long)]
        mirror: bool,

        /// Caption text (caption mode)
        #[arg(long)]
        caption: Option<String>,

        /// Watermark text (caption mode)
        #[arg(long)]
        watermark: Option<String>,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List attached cameras and the facing mode each one serves
    Cameras,

    /// Run one booth session
    Booth {
        /// Image a virtual camera shows instead of a real camera
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Use a virtual camera showing a test pattern
        #[arg(long)]
        virtual_camera: bool,

        /// Filter applied to the capture
        #[arg(short, long, default_value = "original")]
        filter: FilterSelection,

        /// Camera to open
        #[arg(long)]
        facing: Option<FacingMode>,

        /// Toggle the mirror flag before capturing
        #[arg(long)]
        toggle_mirror: bool,

        /// Upload, record and save a local copy
        #[arg(short, long)]
        publish: bool,

        /// Also write the composed PNG here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Moderate published photos
    Photos {
        #[command(subcommand)]
        action: cli::PhotosAction,
    },

    /// Show or change the booth settings
    Settings {
        #[command(subcommand)]
        action: cli::SettingsAction,
    },

    /// Manage overlay templates
    Template {
        #[command(subcommand)]
        action: cli::TemplateAction,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=photobooth=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = photobooth::Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Compose {
            input,
            filter,
            overlay,
            mirror,
            caption,
            watermark,
            output,
        } => cli::compose(
            config,
            cli::ComposeArgs {
                input,
                filter,
                overlay,
                mirror,
                caption,
                watermark,
                output,
            },
        ),
        Commands::Cameras => cli::list_cameras(config),
        Commands::Booth {
            source,
            virtual_camera,
            filter,
            facing,
            toggle_mirror,
            publish,
            output,
        } => cli::run_booth(
            config,
            cli::BoothArgs {
                source,
                virtual_camera,
                filter,
                facing,
                toggle_mirror,
                publish,
                output,
            },
        ),
        Commands::Photos { action } => cli::photos(config, action),
        Commands::Settings { action } => cli::settings(config, action),
        Commands::Template { action } => cli::template(config, action),
    }
}
