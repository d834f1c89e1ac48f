//! Stage 3: static HTML pages per case plus an index. Reads only local files.

mod anonymise;
mod html;
mod threads;

pub use anonymise::Anonymiser;
pub use html::{html_escape, IndexEntry};
pub use threads::{CommentTree, Thread};

use crate::config::ReportOptions;
use crate::manifest::{CaseEntry, CaseStatus, Manifest};
use crate::metrics::MetricRecord;
use crate::model::CommentRow;
use crate::ndjson::read_records;
use crate::paths::{report_index, report_page, DataLayout};
use crate::progress::ProgressScope;
use crate::summary::{Outcome, RunSummary};
use crate::util::{ensure_writable_dir, write_bytes_atomic};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const STAGE: &str = "report";

#[derive(Debug)]
pub struct ReportRun {
    pub pages: usize,
    pub placeholders: usize,
    pub index: PathBuf,
    pub summary: RunSummary,
}

/// Per-case result of rendering.
struct Rendered {
    entry: IndexEntry,
    outcome: Outcome,
    malformed_rows: usize,
}

/// Dataset rows and metrics of a processed case; `None` when either is missing or unreadable.
fn load_case_outputs(layout: &DataLayout, case_id: &str) -> Result<Option<(Vec<CommentRow>, MetricRecord, usize)>> {
    if !layout.is_processed(case_id) {
        return Ok(None);
    }
    let mpath = layout.metrics(case_id);
    let f = File::open(&mpath).with_context(|| format!("open {}", mpath.display()))?;
    let metrics: MetricRecord = match serde_json::from_reader(BufReader::new(f)) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!("{}: unreadable metrics, rendering placeholder: {}", mpath.display(), e);
            return Ok(None);
        }
    };
    let recs = read_records::<CommentRow>(&layout.dataset(case_id))?;
    Ok(Some((recs.items, metrics, recs.malformed.len())))
}

fn render_one(layout: &DataLayout, out_dir: &Path, case: &CaseEntry, opts: &ReportOptions) -> Result<Rendered> {
    let page_path = report_page(out_dir, &case.case_id);
    let page_name = page_path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();

    // Only processed cases get a full page; outputs of other statuses may be stale.
    let loaded = if case.status == CaseStatus::Processed { load_case_outputs(layout, &case.case_id)? } else { None };
    let (html, entry, outcome, malformed_rows) = match loaded {
        Some((rows, metrics, malformed)) => {
            let html = html::render_case_page(case, &rows, &metrics, opts.top_comments, opts.anonymise);
            (html, html::index_entry(case, page_name, Some(&metrics)), Outcome::Completed, malformed)
        }
        None => {
            let (reason, outcome) = match case.status {
                CaseStatus::Unavailable => ("This case is unavailable: the original post was deleted or removed.", Outcome::Unavailable),
                CaseStatus::Failed => ("This case could not be fetched on the last run.", Outcome::Placeholder),
                _ => ("This case has not been processed yet.", Outcome::Placeholder),
            };
            (html::render_placeholder(case, reason), html::index_entry(case, page_name, None), outcome, 0)
        }
    };
    write_bytes_atomic(&page_path, html.as_bytes()).with_context(|| format!("write {}", page_path.display()))?;
    Ok(Rendered { entry, outcome, malformed_rows })
}

/// Render every manifest case into `out_dir`, then the index. Cases without
/// outputs still get a page and an index row.
pub fn run_report(layout: &DataLayout, out_dir: &Path, opts: &ReportOptions) -> Result<ReportRun> {
    ensure_writable_dir(out_dir)?;
    let manifest = Manifest::load(&layout.manifest()).context("load manifest")?;
    let mut summary = RunSummary::new(STAGE);
    summary.add(Outcome::Malformed, manifest.skipped_on_load as u64);

    let cases: Vec<&CaseEntry> = manifest.iter().collect();
    let pb = ProgressScope::count("Rendering pages", cases.len() as u64, opts.progress);
    let rendered: Vec<Rendered> = cases
        .par_iter()
        .map(|case| {
            let r = render_one(layout, out_dir, case, opts);
            pb.inc_items(1);
            r
        })
        .collect::<Result<Vec<_>>>()?;
    pb.finish("pages written");

    let mut entries = Vec::with_capacity(rendered.len());
    let mut placeholders = 0usize;
    for r in rendered {
        summary.bump(r.outcome);
        summary.add(Outcome::Malformed, r.malformed_rows as u64);
        if r.entry.placeholder {
            placeholders += 1;
        }
        entries.push(r.entry);
    }
    entries.sort_by(|a, b| b.created_utc.cmp(&a.created_utc).then_with(|| a.case_id.cmp(&b.case_id)));

    let index = report_index(out_dir);
    write_bytes_atomic(&index, html::render_index(&entries).as_bytes())
        .with_context(|| format!("write {}", index.display()))?;
    tracing::info!("wrote {} page(s) ({} placeholder) and {}", entries.len(), placeholders, index.display());

    let summary = summary.finish(layout)?;
    Ok(ReportRun { pages: entries.len(), placeholders, index, summary })
}
