//! CLI entry point for the papers crawler.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crawler_core::{
    CancelToken, CrawlError, CrawlRequest, CrawlResult, Crawler, CrawlerConfig, DownloadStatus,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod progress_ui;

use cli::{Args, Command, CrawlArgs, JournalsArgs};
use progress_ui::CliProgress;

/// Output folder used when neither `--out` nor the config file names one.
const DEFAULT_OUTPUT_DIR: &str = "papers";

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// Everything finished without a failed item or journal.
    Success,
    /// Some item or journal failed, or the run was interrupted.
    Failure,
    /// The request or configuration was rejected before any work began.
    InvalidInput,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => Self::SUCCESS,
            ProcessExit::Failure => Self::from(1),
            ProcessExit::InvalidInput => Self::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    init_tracing(default_level);

    debug!(?args, "CLI arguments parsed");

    match run(args).await {
        Ok(exit) => exit.into(),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ProcessExit::Failure.into()
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

async fn run(args: Args) -> Result<ProcessExit> {
    let loaded = match app_config::load_file_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return Ok(ProcessExit::InvalidInput);
        }
    };
    if let Some(path) = &loaded.path {
        debug!(path = %path.display(), loaded = loaded.config.is_some(), "config file resolved");
    }

    let mut config = CrawlerConfig::default();
    if let Some(file) = &loaded.config {
        file.apply(&mut config);
    }
    if let Some(base_url) = &args.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(cache) = &args.cache {
        config.cache_path = Some(cache.clone());
    }

    let output_dir = loaded.config.as_ref().and_then(|c| c.output_dir.clone());

    match &args.command {
        Command::Journals(journals) => run_journals(config, journals).await,
        Command::Crawl(crawl) => {
            apply_crawl_overrides(&mut config, crawl);
            run_crawl(config, crawl, output_dir, args.quiet).await
        }
    }
}

fn apply_crawl_overrides(config: &mut CrawlerConfig, crawl: &CrawlArgs) {
    if let Some(workers) = crawl.workers {
        config.workers = usize::from(workers);
    }
    if let Some(ms) = crawl.politeness {
        config.politeness = Duration::from_millis(ms);
    }
    if let Some(max_retries) = crawl.max_retries {
        config.max_retries = u32::from(max_retries);
    }
}

fn build_crawler(config: CrawlerConfig) -> std::result::Result<Crawler, ProcessExit> {
    Crawler::new(config).map_err(|err| {
        eprintln!("Error: {err}");
        match err {
            CrawlError::Config(_) => ProcessExit::InvalidInput,
            _ => ProcessExit::Failure,
        }
    })
}

async fn run_journals(config: CrawlerConfig, args: &JournalsArgs) -> Result<ProcessExit> {
    let crawler = match build_crawler(config) {
        Ok(crawler) => crawler,
        Err(exit) => return Ok(exit),
    };

    let journals = crawler
        .discover_journals(args.refresh)
        .await
        .context("Journal discovery failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&journals)?);
    } else {
        for journal in &journals {
            println!("{}\t{}", journal.slug, journal.display_name);
        }
    }
    info!(journals = journals.len(), "journal discovery complete");
    Ok(ProcessExit::Success)
}

async fn run_crawl(
    config: CrawlerConfig,
    args: &CrawlArgs,
    config_output_dir: Option<PathBuf>,
    quiet: bool,
) -> Result<ProcessExit> {
    let out = args
        .out
        .clone()
        .or(config_output_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let request = CrawlRequest::new(args.journals.iter().cloned(), args.from, args.to, &out)
        .with_limit(args.limit)
        .with_headless(!args.headed);
    if let Err(err) = request.validate() {
        eprintln!("Error: invalid crawl request: {err}");
        return Ok(ProcessExit::InvalidInput);
    }

    let crawler = match build_crawler(config) {
        Ok(crawler) => crawler,
        Err(exit) => return Ok(exit),
    };

    let cancel = CancelToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight downloads");
            signal.cancel();
        }
    });

    let use_spinner = progress_ui::should_use_spinner(
        std::io::stderr().is_terminal(),
        quiet,
        progress_ui::is_dumb_terminal(),
    );
    let progress = CliProgress::new(use_spinner, quiet);

    info!(
        journals = request.journal_slugs().len(),
        from = request.year_from(),
        to = request.year_to(),
        out = %out.display(),
        "crawl starting"
    );
    let result = crawler.crawl_with(&request, &cancel, &progress).await;
    progress.finish();
    let result = result.context("Crawl failed")?;

    let manifest = args
        .manifest
        .clone()
        .unwrap_or_else(|| out.join("manifest.json"));
    write_manifest(&manifest, &result)?;

    if !quiet {
        print_summary(&result, &manifest);
    }

    Ok(exit_outcome(&result))
}

fn write_manifest(path: &Path, result: &CrawlResult) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write manifest '{}'", path.display()))?;
    debug!(path = %path.display(), "manifest written");
    Ok(())
}

fn print_summary(result: &CrawlResult, manifest: &Path) {
    println!(
        "Done: {} downloaded, {} skipped, {} failed",
        result.count(DownloadStatus::Succeeded),
        result.count(DownloadStatus::SkippedExists),
        result.count(DownloadStatus::Failed)
    );
    if !result.journals_covered.is_empty() {
        println!("Journals covered: {}", result.journals_covered.join(", "));
    }
    if result.cancelled {
        println!("Run interrupted; rerun to resume.");
    }
    println!("Manifest: {}", manifest.display());
}

fn exit_outcome(result: &CrawlResult) -> ProcessExit {
    if result.cancelled || result.has_failures() {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}
