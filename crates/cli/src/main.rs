//! CLI tool for rebuilding editable slide decks from page images and OCR tokens.

mod manifest;
mod pipeline;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use slide_core::Settings;
use slide_pptx::PptxWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use manifest::{load_tokens, Manifest};
use pipeline::{install_thread_pool, CancelFlag, Pipeline};

/// Rebuild PowerPoint decks from slide images with editable text.
#[derive(Parser, Debug)]
#[command(name = "slide-rebuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a manifest of page images and tokens into a .pptx file
    Convert(ConvertArgs),

    /// Print the text blocks assembled from a token file as JSON
    Blocks(BlocksArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Manifest JSON listing page images and token files
    manifest: PathBuf,

    /// Output .pptx path
    #[arg(short, long)]
    output: PathBuf,

    /// Settings JSON file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Resolution the pages were rasterized at
    #[arg(long)]
    dpi: Option<u32>,

    /// Keep the original page image instead of erasing text from it
    #[arg(long)]
    no_clean: bool,

    /// Font size multiplier
    #[arg(long)]
    font_boost: Option<f64>,

    /// Smallest font size in points
    #[arg(long)]
    min_font: Option<f64>,

    /// Worker threads (default: one per core)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Give up on pages not started after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct BlocksArgs {
    /// Token file (.tsv from Tesseract, or a JSON token array)
    tokens: PathBuf,

    /// Settings JSON file
    #[arg(short, long)]
    settings: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Command::Convert(args) => convert(&args),
        Command::Blocks(args) => print_blocks(&args),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings {}", path.display())),
        None => Ok(Settings::default()),
    }
}

/// Settings file, then manifest, then flags.
fn resolve_settings(args: &ConvertArgs, manifest: &Manifest) -> Result<Settings> {
    let mut settings = load_settings(args.settings.as_deref())?;

    if let Some(dpi) = args.dpi.or(manifest.dpi) {
        settings = settings.with_dpi(dpi);
    }
    if args.no_clean {
        settings = settings.with_clean_background(false);
    }
    let mut font = settings.font;
    if let Some(boost) = args.font_boost {
        font = font.with_boost_factor(boost);
    }
    if let Some(min_font) = args.min_font {
        font = font.with_min_floor(min_font);
    }
    settings = settings.with_font(font);
    if args.threads.is_some() {
        settings = settings.with_max_threads(args.threads);
    }

    Ok(settings)
}

fn convert(args: &ConvertArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let settings = resolve_settings(args, &manifest)?;

    if manifest.pages.is_empty() {
        anyhow::bail!("Manifest {} lists no pages", args.manifest.display());
    }

    install_thread_pool(settings.max_threads)?;

    let cancel = CancelFlag::new();
    if let Some(secs) = args.timeout_secs {
        cancel.cancel_after(Duration::from_secs(secs));
    }

    let started = Instant::now();
    let pipeline = Pipeline::new(settings);
    let (pages, report) = pipeline.run(&manifest.pages, &cancel)?;

    let settings = pipeline.settings();
    PptxWriter::new(settings.dpi)
        .with_font_scale(settings.font)
        .save(&pages, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    log::info!(
        "{} pages, {} text boxes, {} restored, {} fallbacks in {:.1?}",
        report.pages,
        report.blocks,
        report.restored,
        report.fallbacks,
        started.elapsed()
    );
    if report.fallbacks > 0 {
        log::warn!(
            "{} page(s) kept their original background after restoration failed",
            report.fallbacks
        );
    }

    Ok(())
}

fn print_blocks(args: &BlocksArgs) -> Result<()> {
    let settings = load_settings(args.settings.as_deref())?;
    let tokens = load_tokens(&args.tokens)?;

    let blocks = Pipeline::new(settings).blocks(tokens);
    log::debug!("{} blocks from {}", blocks.len(), args.tokens.display());

    let json = serde_json::to_string_pretty(&blocks).context("Failed to serialize blocks")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert_args(extra: &[&str]) -> ConvertArgs {
        let mut argv = vec!["slide-rebuild", "convert", "deck.json", "-o", "out.pptx"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Convert(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    fn manifest(dpi: Option<u32>) -> Manifest {
        Manifest {
            dpi,
            pages: Vec::new(),
        }
    }

    #[test]
    fn test_defaults_without_flags() {
        let settings = resolve_settings(&convert_args(&[]), &manifest(None)).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_manifest_dpi_applies() {
        let settings = resolve_settings(&convert_args(&[]), &manifest(Some(150))).unwrap();
        assert_eq!(settings.dpi, 150);
        assert_eq!(settings.font.reference_dpi, 150.0);
    }

    #[test]
    fn test_flags_override() {
        let args = convert_args(&[
            "--dpi",
            "200",
            "--no-clean",
            "--font-boost",
            "1.2",
            "--min-font",
            "10",
            "-j",
            "2",
        ]);
        let settings = resolve_settings(&args, &manifest(Some(150))).unwrap();

        assert_eq!(settings.dpi, 200);
        assert!(!settings.clean_background);
        assert_eq!(settings.font.boost_factor, 1.2);
        assert_eq!(settings.font.min_floor, 10.0);
        assert_eq!(settings.max_threads, Some(2));
    }

    #[test]
    fn test_blocks_command_parses() {
        let cli = Cli::parse_from(["slide-rebuild", "blocks", "page.tsv", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Blocks(ref a) if a.tokens == Path::new("page.tsv")));
    }
}
