//! `rc-report`: render HTML pages for every manifest case plus an index.

use anyhow::Result;
use clap::Parser;
use relcases::{init_tracing_once, run_report, DataLayout, FileConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rc-report", version, about = "Render case pages and the index as static HTML")]
struct Cli {
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory; defaults to `<data-dir>/reports`.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Highest-scored threads shown per submission.
    #[arg(long)]
    top_comments: Option<usize>,

    /// Show real usernames.
    #[arg(long)]
    no_anonymise: bool,

    #[arg(long)]
    no_progress: bool,
}

fn main() -> Result<()> {
    init_tracing_once();
    let cli = Cli::parse();
    let file = FileConfig::load(cli.config.as_deref())?;

    let mut opts = file.report;
    if let Some(n) = cli.top_comments {
        opts = opts.with_top_comments(n);
    }
    if cli.no_anonymise {
        opts = opts.with_anonymise(false);
    }
    if cli.no_progress {
        opts = opts.with_progress(false);
    }

    let layout = DataLayout::new(&cli.data_dir);
    let out_dir = cli.out_dir.unwrap_or_else(|| layout.default_reports_dir());
    let run = run_report(&layout, &out_dir, &opts)?;
    println!("wrote {} page(s), {} placeholder(s); index at {}", run.pages, run.placeholders, run.index.display());
    Ok(())
}
