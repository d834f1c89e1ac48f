//! `rc-process`: fetch and flatten the comment forests of every pending case.

use anyhow::{Context, Result};
use clap::Parser;
use relcases::client::RedditClient;
use relcases::{init_tracing_once, run_processor, Credentials, DataLayout, FileConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rc-process", version, about = "Build per-case comment datasets and metrics")]
struct Cli {
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Reprocess cases that already have outputs.
    #[arg(long)]
    force: bool,

    /// Only process these case ids (repeatable).
    #[arg(long = "case")]
    cases: Vec<String>,

    #[arg(long)]
    max_depth: Option<u32>,

    #[arg(long)]
    node_budget: Option<usize>,

    /// "More replies" placeholders expanded per case.
    #[arg(long)]
    expand_budget: Option<usize>,

    /// Reply depth requested with the first forest fetch.
    #[arg(long)]
    expand_depth: Option<u32>,

    /// Cases processed in parallel.
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    no_progress: bool,
}

fn main() -> Result<()> {
    init_tracing_once();
    let cli = Cli::parse();
    let file = FileConfig::load(cli.config.as_deref())?;

    let mut opts = file.processor;
    if cli.force {
        opts = opts.with_force(true);
    }
    if !cli.cases.is_empty() {
        opts = opts.with_only(cli.cases);
    }
    if let Some(d) = cli.max_depth {
        opts = opts.with_max_depth(d);
    }
    if let Some(n) = cli.node_budget {
        opts = opts.with_node_budget(n);
    }
    if let Some(n) = cli.expand_budget {
        opts = opts.with_expand_budget(n);
    }
    if let Some(d) = cli.expand_depth {
        opts = opts.with_expand_depth(d);
    }
    if let Some(w) = cli.workers {
        opts = opts.with_workers(w);
    }
    if cli.no_progress {
        opts = opts.with_progress(false);
    }

    let creds = Credentials::resolve(&file.reddit.credentials)?;
    let client = RedditClient::connect(file.reddit.clone().with_credentials(creds)).context("connect to the API")?;
    let layout = DataLayout::new(&cli.data_dir);

    let report = run_processor(&client, &layout, &opts)?;
    println!(
        "processed {} case(s); {} already done, {} unavailable, {} failed",
        report.processed, report.skipped, report.unavailable, report.failed
    );
    Ok(())
}
