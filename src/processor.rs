//! Stage 2: fetch each pending case's comment forests, flatten them, and
//! write the per-case dataset and metrics.

use crate::client::{ClientError, ContentSource};
use crate::config::ProcessOptions;
use crate::manifest::{CaseEntry, CaseStatus, Manifest};
use crate::metrics::{compute, MetricRecord};
use crate::model::SubmissionRole;
use crate::ndjson::write_records_atomic;
use crate::paths::DataLayout;
use crate::progress::ProgressScope;
use crate::summary::{Outcome, RunSummary};
use crate::traverse::Traversal;
use crate::util::{ensure_writable_dir, remove_with_backoff, sweep_stale_tmp, write_json_atomic};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::fs;

pub const STAGE: &str = "process";

#[derive(Debug)]
pub struct ProcessReport {
    pub processed: usize,
    pub skipped: usize,
    pub unavailable: usize,
    pub failed: usize,
    pub summary: RunSummary,
}

/// How one case ended.
#[derive(Debug)]
pub enum CaseOutcome {
    Processed(MetricRecord),
    Unavailable,
    Failed(String),
}

/// Fetch, flatten and write one case. Upstream trouble is folded into the
/// outcome; only local I/O errors are returned as `Err`.
pub fn process_case(
    source: &dyn ContentSource,
    layout: &DataLayout,
    case: &CaseEntry,
    opts: &ProcessOptions,
) -> Result<CaseOutcome> {
    let id = &case.case_id;
    let gone = match source.get_submission(id) {
        Ok(s) => s.is_unavailable(),
        Err(ClientError::NotFound(_)) => true,
        Err(e) => return Ok(CaseOutcome::Failed(format!("fetch original: {e}"))),
    };
    if gone {
        discard_outputs(layout, id)?;
        return Ok(CaseOutcome::Unavailable);
    }

    let mut traversal = Traversal::new(source, id, opts.limits);
    let posts = std::iter::once((&case.original, SubmissionRole::Original))
        .chain(case.updates.iter().map(|u| (u, SubmissionRole::Update)));
    for (post, role) in posts {
        match source.get_comment_forest(&post.id, opts.expand_depth) {
            Ok(forest) => traversal.flatten(&post.id, role, forest),
            Err(ClientError::NotFound(_)) => {
                tracing::warn!("{}: update {} is gone, no comments taken from it", id, post.id);
            }
            Err(e) => return Ok(CaseOutcome::Failed(format!("comments of {}: {e}", post.id))),
        }
    }
    let flat = traversal.finish();

    let dataset = layout.dataset(id);
    write_records_atomic(&dataset, flat.rows.iter()).with_context(|| format!("write {}", dataset.display()))?;
    let record = compute(case, &flat.rows, flat.incomplete_subtrees);
    // Written last: its presence marks the case as done.
    let metrics = layout.metrics(id);
    write_json_atomic(&metrics, &record).with_context(|| format!("write {}", metrics.display()))?;
    tracing::debug!(
        "{}: {} rows, max depth {}, {} expansion(s)",
        id,
        record.total_comments,
        record.max_depth,
        flat.expansions
    );
    Ok(CaseOutcome::Processed(record))
}

/// Remove what an earlier run wrote for `case_id`, completion marker first.
fn discard_outputs(layout: &DataLayout, case_id: &str) -> Result<()> {
    remove_with_backoff(&layout.metrics(case_id), 4, 25)?;
    remove_with_backoff(&layout.dataset(case_id), 4, 25)
}

/// Outputs on disk are complete and were computed over exactly the case's
/// current submissions. An update merged in since then makes them stale.
fn outputs_are_current(layout: &DataLayout, case: &CaseEntry) -> bool {
    if !layout.is_processed(&case.case_id) {
        return false;
    }
    let path = layout.metrics(&case.case_id);
    let record: MetricRecord = match fs::read(&path).map(|b| serde_json::from_slice(&b)) {
        Ok(Ok(r)) => r,
        Ok(Err(e)) => {
            tracing::warn!("{}: unreadable metrics, reprocessing: {}", path.display(), e);
            return false;
        }
        Err(e) => {
            tracing::warn!("{}: {}", path.display(), e);
            return false;
        }
    };
    let mut want: Vec<&str> = std::iter::once(case.original.id.as_str())
        .chain(case.updates.iter().map(|u| u.id.as_str()))
        .collect();
    let mut have: Vec<&str> = record.submissions.iter().map(|s| s.submission_id.as_str()).collect();
    want.sort_unstable();
    have.sort_unstable();
    want == have
}

pub fn run_processor(source: &dyn ContentSource, layout: &DataLayout, opts: &ProcessOptions) -> Result<ProcessReport> {
    ensure_writable_dir(layout.root())?;
    ensure_writable_dir(&layout.cases_dir())?;
    sweep_stale_tmp(layout.root())?;
    sweep_stale_tmp(&layout.cases_dir())?;

    let manifest = Manifest::load(&layout.manifest()).context("load manifest")?;
    let mut summary = RunSummary::new(STAGE);
    summary.add(Outcome::Malformed, manifest.skipped_on_load as u64);

    for want in &opts.only {
        if manifest.get(want).is_none() {
            tracing::warn!("case {} is not in the manifest", want);
        }
    }

    let mut todo: Vec<CaseEntry> = Vec::new();
    let mut resumed: Vec<String> = Vec::new();
    let mut skipped = 0usize;
    let mut unavailable = 0usize;
    for case in manifest.iter() {
        if !opts.only.is_empty() && !opts.only.contains(&case.case_id) {
            continue;
        }
        if case.status == CaseStatus::Unavailable {
            summary.bump(Outcome::Unavailable);
            unavailable += 1;
            continue;
        }
        if !opts.force && case.status != CaseStatus::Failed && outputs_are_current(layout, case) {
            summary.bump(Outcome::SkippedExisting);
            skipped += 1;
            if case.status != CaseStatus::Processed {
                resumed.push(case.case_id.clone());
            }
            continue;
        }
        todo.push(case.clone());
    }
    tracing::info!("{} case(s) to process, {} already done, {} unavailable", todo.len(), skipped, unavailable);

    let manifest = Mutex::new(manifest);
    if !resumed.is_empty() {
        // Outputs finished on an interrupted run before the manifest caught up.
        let mut m = manifest.lock();
        for id in &resumed {
            m.set_status(id, CaseStatus::Processed);
        }
        m.save(&layout.manifest()).context("write manifest")?;
    }

    let summary = Mutex::new(summary);
    let counts = Mutex::new((0usize, 0usize, 0usize));
    let pb = ProgressScope::count("Processing cases", todo.len() as u64, opts.progress);

    let handle = |case: &CaseEntry| -> Result<()> {
        let outcome = process_case(source, layout, case, opts)?;
        let status = match &outcome {
            CaseOutcome::Processed(record) => {
                let mut s = summary.lock();
                s.bump(Outcome::Completed);
                s.add(Outcome::IncompleteSubtree, record.incomplete_subtrees);
                counts.lock().0 += 1;
                CaseStatus::Processed
            }
            CaseOutcome::Unavailable => {
                tracing::info!("{}: original is deleted, marking unavailable", case.case_id);
                summary.lock().bump(Outcome::Unavailable);
                counts.lock().1 += 1;
                CaseStatus::Unavailable
            }
            CaseOutcome::Failed(why) => {
                tracing::warn!("{}: {}", case.case_id, why);
                summary.lock().bump(Outcome::Failed);
                counts.lock().2 += 1;
                CaseStatus::Failed
            }
        };
        {
            let mut m = manifest.lock();
            m.set_status(&case.case_id, status);
            m.save(&layout.manifest()).context("write manifest")?;
        }
        pb.inc_items(1);
        Ok(())
    };

    if opts.workers > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.workers)
            .build()
            .context("build worker pool")?;
        pool.install(|| todo.par_iter().try_for_each(|c| handle(c)))?;
    } else {
        for case in &todo {
            handle(case)?;
        }
    }
    pb.finish("done");

    let (processed, newly_unavailable, failed) = counts.into_inner();
    let summary = summary.into_inner().finish(layout)?;
    Ok(ProcessReport { processed, skipped, unavailable: unavailable + newly_unavailable, failed, summary })
}
