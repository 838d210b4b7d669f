//! Command line entry point: downloads the vanilla assets and UABE, then
//! builds the UI asset variants for the requested chapter.
use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use log::info;
use ui_assets_build::config::DEFAULT_CONFIG_FILE;
use ui_assets_build::{
    build, init_logging, BuildOptions, BuildSummary, HttpTimestampFetcher, SystemCommandRunner,
    Target,
};

/// Download and install dependencies for the UI editing scripts, then build
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chapter to build, `all` for every chapter, or `github_actions` to read
    /// the chapter from the GITHUB_REF tag
    chapter: String,

    /// Re-download archives even if they look up to date
    #[arg(long)]
    force_download: bool,

    /// Configuration file [default: ui-assets-build.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv_override().ok();
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args
        .config
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let loaded = match &args.config {
        Some(path) => BuildOptions::load_from(path),
        None => BuildOptions::load(),
    };
    let mut options = loaded.wrap_err_with(|| format!("failed to load {}", config.display()))?;
    options.force_download |= args.force_download;

    let target: Target = match args.chapter.parse() {
        Ok(target) => target,
        Err(never) => match never {},
    };
    let fetcher = HttpTimestampFetcher::new(options.http_timeout())?;

    match build(&options, &target, &SystemCommandRunner, Box::new(fetcher))? {
        BuildSummary::Built { variants } => info!("Built {} variant(s)", variants.len()),
        BuildSummary::Skipped { .. } => {}
    }
    Ok(())
}
