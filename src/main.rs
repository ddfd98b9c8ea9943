//! repo-miner command line
//!
//! Lists every commit of a local git repository into a CSV file, one row per
//! commit with line statistics, touched files and branches.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use clap::Parser;
use repo_miner::config::MinerConfig;
use repo_miner::filter::Commits;
use repo_miner::study::{ListCommits, Study};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "repo-miner")]
#[command(about = "Extract metrics from git commits and store them in a CSV file")]
#[command(version, long_version = LONG_VERSION)]
struct Args {
    /// Directory containing the git repository to analyze
    #[arg(long, short, value_name = "DIR")]
    repo: PathBuf,

    /// Name of the output CSV file
    #[arg(long, short, value_name = "FILE")]
    output: PathBuf,

    /// Overwrite the output file if it already exists
    #[arg(long, short)]
    force: bool,

    /// Worker threads (overrides config and REPO_MINER_THREADS)
    #[arg(long, short)]
    threads: Option<usize>,

    /// Only commits authored on or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE")]
    since: Option<String>,

    /// Skip merge commits
    #[arg(long)]
    no_merges: bool,

    /// Skip the branch containment lookup
    #[arg(long)]
    omit_branches: bool,

    /// Only follow the first parent of HEAD
    #[arg(long)]
    first_parent: bool,

    /// Mine newest commits first
    #[arg(long)]
    reverse_order: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repo_miner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    validate_repo_dir(&args.repo)?;
    validate_output(&args.output, args.force)?;

    let mut config = MinerConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(threads) = args.threads {
        config.mining.threads = threads;
    }
    config.git.omit_branches |= args.omit_branches;
    config.git.first_parent_only |= args.first_parent;
    config.mining.reverse_order |= args.reverse_order;
    config.validate()?;

    let mut study = ListCommits::new(&args.repo, &args.output);
    study.settings = config.git_settings();
    study.threads = config.mining.threads;
    study.reverse_order = config.mining.reverse_order;
    study.no_merges = args.no_merges;
    if let Some(since) = &args.since {
        study.range = Commits::since(parse_date(since)?);
    }

    tracing::info!(
        "Listing commits of {} into {}",
        args.repo.display(),
        args.output.display()
    );
    study.execute()
}

fn validate_repo_dir(repo: &Path) -> Result<()> {
    if !repo.exists() {
        bail!("Repository directory does not exist: {}", repo.display());
    }
    if !repo.is_dir() {
        bail!("Repository is not a directory: {}", repo.display());
    }
    Ok(())
}

fn validate_output(output: &Path, force: bool) -> Result<()> {
    if output.is_dir() {
        bail!("Output file exists and is a directory: {}", output.display());
    }
    if output.is_file() && !force {
        bail!(
            "Refusing to overwrite output file: {} (specify `--force' to overwrite.)",
            output.display()
        );
    }
    Ok(())
}

fn parse_date(text: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Ok(date);
    }
    let day = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", text))?;
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .context("Invalid time of day")?;
    Ok(Utc.from_utc_datetime(&midnight).fixed_offset())
}
