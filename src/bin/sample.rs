//! `rc-sample`: list a community, link updates to their originals, and merge
//! the cases into `<data-dir>/manifest.jsonl`.

use anyhow::{Context, Result};
use clap::Parser;
use relcases::client::{ListingSort, RedditClient};
use relcases::{init_tracing_once, run_sampler, Credentials, DataLayout, FileConfig, YearMonth};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rc-sample", version, about = "Sample update stories into the case manifest")]
struct Cli {
    /// Data directory holding the manifest and case outputs.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Optional TOML config file; command-line flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Community to sample, with or without the `r/` prefix.
    #[arg(long)]
    community: Option<String>,

    /// Listing order: new, hot, top or top:<day|week|month|year|all>.
    #[arg(long)]
    sort: Option<ListingSort>,

    #[arg(long)]
    min_cases: Option<usize>,

    #[arg(long)]
    max_cases: Option<usize>,

    /// Stop after inspecting this many listing entries.
    #[arg(long)]
    scan_limit: Option<usize>,

    /// Ignore posts older than this month (YYYY-MM).
    #[arg(long)]
    since: Option<YearMonth>,

    #[arg(long)]
    update_flair: Option<String>,

    #[arg(long)]
    original_flair: Option<String>,

    /// Also keep originals that have no update.
    #[arg(long)]
    include_without_update: bool,

    /// Do not search the community for originals missing from the listing.
    #[arg(long)]
    no_search: bool,

    #[arg(long)]
    no_progress: bool,
}

fn main() -> Result<()> {
    init_tracing_once();
    let cli = Cli::parse();
    let file = FileConfig::load(cli.config.as_deref())?;

    let mut opts = file.sampler;
    if let Some(c) = &cli.community {
        opts = opts.with_community(c);
    }
    if let Some(s) = cli.sort {
        opts = opts.with_sort(s);
    }
    let min = cli.min_cases.unwrap_or(opts.min_cases);
    let max = cli.max_cases.unwrap_or(opts.max_cases);
    opts = opts.with_sample_size(min, max);
    if let Some(n) = cli.scan_limit {
        opts = opts.with_scan_limit(n);
    }
    if cli.since.is_some() {
        opts = opts.with_since(cli.since);
    }
    if let Some(f) = cli.update_flair {
        opts = opts.with_update_flair(f);
    }
    if let Some(f) = cli.original_flair {
        opts = opts.with_original_flair(f);
    }
    if cli.include_without_update {
        opts = opts.with_require_update(false);
    }
    if cli.no_search {
        opts = opts.with_search_fallback(false);
    }
    if cli.no_progress {
        opts = opts.with_progress(false);
    }

    let creds = Credentials::resolve(&file.reddit.credentials)?;
    let client = RedditClient::connect(file.reddit.clone().with_credentials(creds)).context("connect to the API")?;
    let layout = DataLayout::new(&cli.data_dir);

    let report = run_sampler(&client, &layout, &opts)?;
    println!(
        "sampled {} case(s) from r/{}: {} new, {} updated, manifest now holds {}",
        report.cases_sampled, opts.community, report.added, report.updated, report.manifest_len
    );
    Ok(())
}
