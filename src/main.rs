//! Lexi - Real-time OCR translation overlay
//!
//! Finds text in video frames, translates it into a target language and draws
//! the translation back over the frame.

mod app;
mod capture;
mod config;
mod overlay;
mod pipeline;
mod shared;
mod storage;
mod translate;
mod vision;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::LexiApp;
use crate::config::{AppConfig, CaptureSourceKind};
use crate::shared::StopSignal;

/// Lexi - Real-time OCR translation overlay
#[derive(Parser, Debug)]
#[command(name = "lexi")]
#[command(about = "Translate the text in video frames and draw it back over the picture")]
struct Args {
    /// Config file (defaults to config.toml in the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Target language code, overrides the config file
    #[arg(short, long, global = true)]
    target: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate frames from the configured capture source until stopped
    Stream {
        /// Read frames from this directory instead of the configured source
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },

    /// Translate the text found in a single image
    Image {
        path: PathBuf,

        /// Write the annotated image here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Translate text given on the command line
    Translate {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Download the OCR models if needed and show their status
    Models,

    /// Print the effective configuration
    Config {
        /// Also save it to the config file
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => storage::get_config_dir().ok().map(|dir| dir.join("config.toml")),
    };
    let mut config = load_or_create_config(args.config.as_deref())?;
    if let Some(target) = args.target {
        config.general.target_language = target;
    }
    if let Command::Stream { frames, max_frames } = &args.command {
        if let Some(dir) = frames {
            config.capture.source = CaptureSourceKind::Frames;
            config.capture.frames_dir = Some(dir.clone());
        }
        if max_frames.is_some() {
            config.capture.max_frames = *max_frames;
        }
    }

    let app = LexiApp::new(config);

    match args.command {
        Command::Stream { .. } => run_stream(&app),
        Command::Image { path, output } => {
            let context = app.build_context()?;
            let report = app.translate_image(&context, &path, output.as_deref())?;
            for result in &report.results {
                println!("{}", result.translated_text);
            }
            Ok(())
        }
        Command::Translate { text } => {
            let translator = app.translator()?;
            for line in app.translate_texts(&translator, &text)? {
                println!("{}", line);
            }
            Ok(())
        }
        Command::Models => {
            let models = app.model_manager()?;
            if models.are_models_ready() {
                println!("All models present");
            } else {
                println!("Downloading missing models...");
                models.ensure_all_models()?;
            }
            println!("Models directory: {:?}", models.models_dir());
            for (model_type, available, size) in models.get_model_status() {
                println!(
                    "  {:<24} {:<10} {}",
                    model_type.display_name(),
                    if available { "ready" } else { "missing" },
                    size.map(|s| format!("{:.1} MB", s as f64 / 1_048_576.0)).unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Config { write } => {
            print!("{}", toml::to_string_pretty(app.config())?);
            if write {
                let path = config_path.ok_or_else(|| anyhow::anyhow!("No config path; pass --config"))?;
                config::save_config(app.config(), &path)?;
                info!("Configuration written to {:?}", path);
            }
            Ok(())
        }
    }
}

fn run_stream(app: &LexiApp) -> Result<()> {
    let context = app.build_context()?;

    // Stop after the frame in flight on Ctrl+C
    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        info!("Stop requested, finishing current frame...");
        handler_stop.stop();
    })?;

    let summary = app.run_stream(&context, stop)?;
    let runtime = app.runtime().read().clone();
    println!(
        "Processed {} frames from {} ({} text regions, {} failed translations) in {:.1}s, {:.1} fps",
        summary.frames,
        runtime.current_source.as_deref().unwrap_or("unknown source"),
        summary.detections,
        summary.failed_translations,
        summary.elapsed.as_secs_f32(),
        runtime.capture_fps
    );
    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    match storage::get_config_dir() {
        Ok(config_dir) => {
            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                let config = config::load_config(&config_path)?;
                info!("Loaded configuration from {:?}", config_path);
                return Ok(config);
            }
        }
        Err(e) => warn!("No config directory available: {:#}", e),
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}
