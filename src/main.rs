use anyhow::Context;
use clap::Parser;
use image::ImageReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use waybill_marker::{
    MarkerSearch, OcrsBackend, OverlayRenderer, RankingPolicy, SearchConfig, load_config,
    process_folder,
};

#[derive(Parser)]
#[command(name = "waybill-marker")]
#[command(about = "Find and read the marker line on shipping label photos")]
struct Cli {
    /// Image file, or a folder of images for batch mode
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Batch output directory (overlays and predictions.json)
    #[arg(long, value_name = "DIR", default_value = "results")]
    output_dir: PathBuf,

    /// Write the overlay of a single image to this file
    #[arg(long, value_name = "FILE")]
    overlay: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the ocrs detection and recognition models
    #[arg(long, value_name = "DIR")]
    models_dir: Option<PathBuf>,

    /// Never run the fallback backend
    #[arg(long)]
    no_fallback: bool,

    /// Rank any strict match above any loose match
    #[arg(long)]
    strict_first: bool,

    /// TTF/OTF font for overlay captions
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    /// Save every generated variant to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(args: &Cli) -> anyhow::Result<SearchConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path).with_context(|| format!("loading config {}", path.display()))?,
        None => SearchConfig::default(),
    };

    if let Some(dir) = &args.models_dir {
        config.backend.models_dir = Some(dir.clone());
    }
    if args.no_fallback {
        config.fallback_enabled = false;
    }
    if args.strict_first {
        config.ranking = RankingPolicy::StrictFirst;
    }
    if let Some(font) = &args.font {
        config.overlay.font_path = Some(font.clone());
    }
    Ok(config)
}

fn build_search(args: &Cli, config: SearchConfig) -> anyhow::Result<MarkerSearch> {
    let primary = OcrsBackend::primary(&config.backend)?;
    let fallback = if config.fallback_enabled {
        Some(OcrsBackend::fallback(&config.backend)?)
    } else {
        None
    };

    let mut search = MarkerSearch::with_config(Arc::new(primary), config);
    if let Some(fallback) = fallback {
        search = search.with_fallback(Arc::new(fallback));
    }
    if let Some(debug_dir) = &args.debug_out {
        search = search.with_debug(debug_dir.clone())?;
    }
    Ok(search)
}

fn run_single(
    path: &Path,
    overlay_path: Option<&Path>,
    verbose: bool,
    search: &MarkerSearch,
    renderer: &OverlayRenderer,
) -> anyhow::Result<()> {
    let img = ImageReader::open(path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
    info!(width = img.width(), height = img.height(), "image loaded");

    let best = search.search(&img)?;

    match (&best.text, best.provenance()) {
        (Some(text), Some(variant)) => {
            println!("\n=== Marker Line ===");
            println!("  {}", text);
            println!("  variant: {}  confidence: {:.2}", variant, best.confidence);
        }
        _ => {
            println!("\nNo marker line found ({} attempts).", best.attempts);
        }
    }

    if verbose && !best.raw.is_empty() {
        println!("\nRaw OCR lines:");
        for line in best.raw_lines() {
            println!("  {}", line);
        }
    }

    if let Some(out) = overlay_path {
        let overlay = renderer.render(&best.image, best.line.as_ref());
        overlay
            .to_rgb8()
            .save(out)
            .with_context(|| format!("writing overlay {}", out.display()))?;
        info!(path = %out.display(), "overlay saved");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = build_config(&args)?;
    let renderer = OverlayRenderer::from_config(&config.overlay)?;
    let search = build_search(&args, config)?;

    if args.input.is_dir() {
        if args.overlay.is_some() {
            warn!("--overlay is ignored in batch mode");
        }
        let summary = process_folder(&args.input, &args.output_dir, &search, &renderer)?;
        println!("\n=== Batch Results ===");
        println!("Images processed: {}", summary.total);
        println!("Marker found:     {}", summary.found);
        println!("Failed:           {}", summary.failed);
        println!("Hit rate:         {:.1}%", summary.hit_rate() * 100.0);
        println!("Results written to {}", args.output_dir.display());
    } else {
        run_single(&args.input, args.overlay.as_deref(), args.verbose, &search, &renderer)?;
    }

    Ok(())
}
