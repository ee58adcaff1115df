//! plugin-index - regenerate the plugin index from GitHub releases
//!
//! Reads a repository list, rebuilds `<output>/plugins/<name>.json` for every
//! repository and mirrors missing package versions into the NuGet feed.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use plugin_index_core::config::{
    DEFAULT_CONCURRENCY, DEFAULT_INDEX_URL, DEFAULT_MANIFEST_FILE, DEFAULT_REGISTRY_OWNER,
};
use plugin_index_core::{BuilderOptions, Credentials, IndexBuilder, RepositoryOutcome, RunReport};

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "plugin-index",
    about = "Builds the plugin index from GitHub releases and mirrors packages",
    version
)]
struct Cli {
    /// Repository list (JSON)
    repositories: PathBuf,

    /// Log each download and extraction
    #[clap(short, long)]
    verbose: bool,

    /// Directory the index is written to
    #[clap(short, long, default_value = "out")]
    output: PathBuf,

    /// Scratch directory for downloads
    #[clap(short, long, default_value = "tmp")]
    workdir: PathBuf,

    /// Maximum concurrent repositories, releases and pushes
    #[clap(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Owner of the NuGet feed packages are mirrored into
    #[clap(long, default_value = DEFAULT_REGISTRY_OWNER)]
    registry_owner: String,

    /// Base URL of the currently published index
    #[clap(long, default_value = DEFAULT_INDEX_URL)]
    index_url: String,

    /// Only rebuild the index, do not mirror packages
    #[clap(long)]
    no_mirror: bool,

    /// Set log level
    #[clap(long, default_value = "info")]
    log_level: LogLevel,
}

impl Cli {
    fn builder_options(&self) -> BuilderOptions {
        BuilderOptions {
            work_dir: self.workdir.clone(),
            output_dir: self.output.clone(),
            concurrency: self.concurrency,
            index_url: self.index_url.clone(),
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            mirror: !self.no_mirror,
            verbose: self.verbose,
        }
    }
}

fn initialize_tracing(log_level: &LogLevel, verbose: bool) {
    // RUST_LOG wins over --log-level when set
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if verbose {
        if let Ok(parsed) = "plugin_index_core=debug".parse() {
            filter = filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.verbose);

    if !cli.repositories.is_file() {
        eprintln!(
            "Error: repository list not found: {}",
            cli.repositories.display()
        );
        std::process::exit(1);
    }

    let credentials = Credentials::from_env(&cli.registry_owner);
    debug!("Using credentials {:?}", credentials);
    if !credentials.has_token() && !cli.no_mirror {
        warn!("GITHUB_TOKEN is not set; releases are listed anonymously and mirroring is skipped");
    }

    let builder = IndexBuilder::new(cli.builder_options(), &cli.registry_owner, credentials)
        .context("Failed to set up HTTP services")?;

    let report = builder
        .run_from_file(&cli.repositories)
        .await
        .with_context(|| format!("Failed to build index from {}", cli.repositories.display()))?;

    print_report(&report);
    Ok(())
}

/// Table row for one repository
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Repository")]
    name: String,
    #[tabled(rename = "Releases")]
    releases: String,
    #[tabled(rename = "Skipped")]
    skipped: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Latest Beta")]
    latest_beta: String,
    #[tabled(rename = "Mirrored")]
    mirrored: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&RepositoryOutcome> for OutcomeRow {
    fn from(outcome: &RepositoryOutcome) -> Self {
        let mirrored = match outcome.mirror {
            Some(m) if m.failed > 0 => format!("{} pushed, {} failed", m.pushed, m.failed),
            Some(m) => format!("{} pushed", m.pushed),
            None => "-".to_string(),
        };

        Self {
            name: outcome.name.clone(),
            releases: outcome.releases.to_string(),
            skipped: outcome.releases_skipped.to_string(),
            latest: outcome.latest_version.clone().unwrap_or_else(|| "-".to_string()),
            latest_beta: outcome
                .latest_beta_version
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            mirrored,
            status: match &outcome.error {
                Some(e) => format!("failed: {e}"),
                None => "ok".to_string(),
            },
        }
    }
}

fn print_report(report: &RunReport) {
    if report.repositories.is_empty() {
        println!("No repositories configured.");
        return;
    }

    let rows: Vec<OutcomeRow> = report.repositories.iter().map(OutcomeRow::from).collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
    println!(
        "{} succeeded, {} failed, {} package(s) pushed",
        report.succeeded_count(),
        report.failed_count(),
        report.pushed_count()
    );
}
