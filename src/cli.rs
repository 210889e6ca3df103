//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Download open-access PDFs from Cell Press journals.
///
/// Discovers journals, walks their newest-article listings, keeps the
/// open-access articles published inside a year window and saves their PDFs
/// into one folder per journal. Reruns skip files already on disk.
#[derive(Parser, Debug)]
#[command(name = "papers-crawler")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/papers-crawler/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Discovery cache file
    #[arg(long, value_name = "PATH", global = true)]
    pub cache: Option<PathBuf>,

    /// Site root to crawl
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the journals the site offers
    Journals(JournalsArgs),
    /// Download open-access PDFs for the given journals
    Crawl(CrawlArgs),
}

/// Arguments of `papers-crawler journals`.
#[derive(clap::Args, Debug)]
pub struct JournalsArgs {
    /// Ignore the cached journal list
    #[arg(long)]
    pub refresh: bool,

    /// Print the list as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments of `papers-crawler crawl`.
#[derive(clap::Args, Debug)]
pub struct CrawlArgs {
    /// Journal slugs to crawl, e.g. `cell` or `cell-reports`
    #[arg(short = 'j', long = "journal", value_name = "SLUG", num_args = 1.., required = true)]
    pub journals: Vec<String>,

    /// First publication year to keep
    #[arg(long, value_name = "YEAR")]
    pub from: i32,

    /// Last publication year to keep
    #[arg(long, value_name = "YEAR")]
    pub to: i32,

    /// Output folder (defaults to config `output_dir`, then ./papers)
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Download at most N articles per journal (0 = unlimited)
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub limit: usize,

    /// Show the browser window when rendering is needed
    #[arg(long)]
    pub headed: bool,

    /// Concurrent download workers (1-32)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub workers: Option<u8>,

    /// Minimum delay between downloads in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub politeness: Option<u64>,

    /// Maximum attempts per PDF for transient failures (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: Option<u8>,

    /// Where to write the result manifest (defaults to OUT/manifest.json)
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,
}
