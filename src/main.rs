// Command-line entry point: offline tools around the capture and cache core

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scan_translate::{
    core::Config,
    services::cache::{derive_key, KeyRequest},
    services::recognition::crop_region,
    services::translation::TRANSLATION_NAMESPACE,
    FrameDimensions, RegionSelection, ViewportRect,
};

#[derive(Parser)]
#[command(name = "scan-translate", about = "Region capture and translation cache tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crop a photo to an overlay rectangle given in viewport coordinates
    Crop(CropArgs),
    /// Print the cache key of a translation request
    Key(KeyArgs),
    /// Print the effective configuration
    Config {
        /// Fail when the remote service credential is missing
        #[arg(long)]
        check: bool,
    },
}

#[derive(Args)]
struct CropArgs {
    /// Captured photo (PNG or JPEG)
    #[arg(long)]
    image: PathBuf,
    /// Viewport size as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size)]
    viewport: FrameDimensions,
    /// Overlay rectangle as X,Y,WIDTH,HEIGHT
    #[arg(long, value_parser = parse_rect)]
    rect: ViewportRect,
    /// Output PNG
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args)]
struct KeyArgs {
    #[arg(long)]
    text: String,
    #[arg(long)]
    target: String,
    #[arg(long)]
    source: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::new().context("Failed to load configuration")?;

    let filter = EnvFilter::new(format!(
        "scan_translate={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Crop(args) => crop(args).await,
        Commands::Key(args) => {
            let key = derive_key(&KeyRequest::new(&args.text, &args.target, args.source.as_deref()));
            println!("{}{}", TRANSLATION_NAMESPACE, key);
            Ok(())
        }
        Commands::Config { check } => {
            print_config(&config);
            if check {
                config.require_api_key()?;
            }
            Ok(())
        }
    }
}

async fn crop(args: CropArgs) -> Result<()> {
    let photo = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("Failed to read {}", args.image.display()))?;

    let selection = RegionSelection {
        rect: args.rect,
        viewport: args.viewport,
    };
    let (rect, png) = crop_region(&photo, &selection).await?;

    tokio::fs::write(&args.out, png)
        .await
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    info!(
        "Cropped {}x{} at ({}, {}) -> {}",
        rect.width,
        rect.height,
        rect.origin_x,
        rect.origin_y,
        args.out.display()
    );
    Ok(())
}

/// Configuration summary without exposing the API key
fn print_config(config: &Config) {
    println!("log_level            = {}", config.log_level());
    println!("translation_ttl      = {}s", config.translation_ttl().as_secs());
    println!("speech_ttl           = {}s", config.speech_ttl().as_secs());
    println!("eviction_interval    = {}s", config.eviction_interval().as_secs());
    println!("cache_max_entries    = {}", config.max_entries());
    println!("max_batch_size       = {}", config.max_batch_size());
    println!("batch_window         = {}ms", config.batch_window().as_millis());
    println!(
        "api_key              = {}",
        if config.require_api_key().is_ok() { "[set]" } else { "[missing]" }
    );
    println!("default_target       = {}", config.default_target_language());
    println!("default_voice        = {}", config.default_voice_language());
}

fn parse_size(s: &str) -> Result<FrameDimensions> {
    let Some((w, h)) = s.split_once(['x', 'X']) else {
        bail!("expected WIDTHxHEIGHT, got '{}'", s);
    };
    Ok(FrameDimensions::new(w.trim().parse()?, h.trim().parse()?))
}

fn parse_rect(s: &str) -> Result<ViewportRect> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid number in '{}'", s))?;

    match parts.as_slice() {
        [x, y, width, height] => Ok(ViewportRect::new(*x, *y, *width, *height)),
        _ => bail!("expected X,Y,WIDTH,HEIGHT, got '{}'", s),
    }
}
