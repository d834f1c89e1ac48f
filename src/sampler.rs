//! Stage 1: list a community, classify posts, link updates to originals, and
//! merge the resulting cases into the manifest.

use crate::classify::{match_by_title, original_title_from_update, referenced_ids, same_author, Classifier, PostKind};
use crate::client::{ClientError, ContentSource};
use crate::config::SamplerOptions;
use crate::date::now_epoch;
use crate::manifest::{CaseEntry, Manifest};
use crate::model::Submission;
use crate::paths::DataLayout;
use crate::progress::ProgressScope;
use crate::summary::{Outcome, RunSummary};
use crate::util::ensure_writable_dir;
use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use std::collections::BTreeMap;

pub const STAGE: &str = "sample";

const PAGE_SIZE: usize = 100;
const SEARCH_LIMIT: usize = 10;

/// Result of a sampler run.
#[derive(Debug)]
pub struct SampleReport {
    pub cases_sampled: usize,
    pub added: usize,
    pub updated: usize,
    pub manifest_len: usize,
    pub summary: RunSummary,
}

/// Posts gathered from the listing, split by kind.
#[derive(Default)]
struct Harvest {
    originals: BTreeMap<String, Submission>,
    updates: Vec<Submission>,
    seen: AHashSet<String>,
}

pub fn run_sampler(source: &dyn ContentSource, layout: &DataLayout, opts: &SamplerOptions) -> Result<SampleReport> {
    ensure_writable_dir(layout.root())?;
    let mut summary = RunSummary::new(STAGE);
    let mut manifest = Manifest::load(&layout.manifest()).context("load manifest")?;
    summary.add(Outcome::Malformed, manifest.skipped_on_load as u64);

    let classifier = Classifier::new(opts.update_flair.clone(), opts.original_flair.clone());
    let harvest = harvest_listing(source, opts, &classifier, &mut summary);
    tracing::info!(
        "r/{}: {} candidate originals, {} updates",
        opts.community,
        harvest.originals.len(),
        harvest.updates.len()
    );

    let cases = link_cases(source, opts, &classifier, harvest, &mut summary);
    let cases = select_cases(cases, opts);
    if cases.len() < opts.min_cases {
        tracing::warn!("sampled {} case(s), below the requested minimum of {}", cases.len(), opts.min_cases);
    }

    let (mut added, mut updated) = (0usize, 0usize);
    let sampled = cases.len();
    for case in cases {
        if case.status == crate::manifest::CaseStatus::Unavailable {
            summary.bump(Outcome::Unavailable);
        } else {
            summary.bump(Outcome::Completed);
        }
        let out = manifest.merge(case);
        added += out.added;
        updated += out.updated;
    }
    manifest.save(&layout.manifest()).context("write manifest")?;
    tracing::info!("manifest: {} case(s), {} new, {} updated", manifest.len(), added, updated);

    let summary = summary.finish(layout)?;
    Ok(SampleReport { cases_sampled: sampled, added, updated, manifest_len: manifest.len(), summary })
}

/// Enough material to fill `max_cases`, judged by the kind of post a case hinges on.
fn harvest_is_full(h: &Harvest, opts: &SamplerOptions) -> bool {
    if opts.require_update {
        h.updates.len() >= opts.max_cases
    } else {
        h.originals.len() + h.updates.len() >= opts.max_cases
    }
}

fn harvest_listing(
    source: &dyn ContentSource,
    opts: &SamplerOptions,
    classifier: &Classifier,
    summary: &mut RunSummary,
) -> Harvest {
    let mut h = Harvest::default();
    let cutoff = opts.since.map(|ym| ym.start_epoch());
    let pb = ProgressScope::count(format!("Sampling r/{}", opts.community), opts.scan_limit as u64, opts.progress);
    let mut after: Option<String> = None;
    let mut scanned = 0usize;

    'pages: while scanned < opts.scan_limit {
        let want = PAGE_SIZE.min(opts.scan_limit - scanned);
        let page = match source.list_submissions(&opts.community, opts.sort, want, after.as_deref()) {
            Ok(p) => p,
            Err(e) => {
                // Keep what we have; a partial sample is still a valid run.
                tracing::warn!("listing r/{} stopped early: {}", opts.community, e);
                summary.bump(Outcome::Failed);
                break;
            }
        };
        summary.add(Outcome::Malformed, page.malformed as u64);
        scanned += page.submissions.len() + page.malformed;
        pb.inc_items((page.submissions.len() + page.malformed) as u64);

        for s in page.submissions {
            if let Some(cut) = cutoff {
                if s.created_utc < cut {
                    if opts.sort.is_chronological() {
                        break 'pages;
                    }
                    continue;
                }
            }
            if !h.seen.insert(s.id.clone()) {
                continue;
            }
            match classifier.classify(&s) {
                PostKind::Original => {
                    h.originals.insert(s.id.clone(), s);
                }
                PostKind::Update => h.updates.push(s),
                PostKind::Other => summary.bump(Outcome::Ignored),
            }
        }

        if harvest_is_full(&h, opts) {
            break;
        }
        match page.after {
            Some(a) => after = Some(a),
            None => break,
        }
    }
    pb.finish(format!("scanned {scanned}"));
    h
}

/// Placeholder for an original the API no longer returns.
fn tombstone(id: &str, created_utc: i64) -> Submission {
    Submission {
        id: id.to_string(),
        author: None,
        title: "[deleted]".to_string(),
        selftext: "[deleted]".to_string(),
        score: 0,
        created_utc,
        flair: None,
        permalink: String::new(),
        num_comments: 0,
        upvote_ratio: None,
        is_self: true,
        stickied: false,
        distinguished: false,
    }
}

/// Resolve each update's original. Rules, first hit wins:
/// 1. a permalink in the update's body pointing at the same author's original
///    (or at a post that is gone);
/// 2. a same-author original from the listing whose title matches;
/// 3. community search on the cleaned title, same filter as (2).
fn link_cases(
    source: &dyn ContentSource,
    opts: &SamplerOptions,
    classifier: &Classifier,
    harvest: Harvest,
    summary: &mut RunSummary,
) -> Vec<CaseEntry> {
    let Harvest { mut originals, mut updates, .. } = harvest;
    // Oldest first, so "Update 2" can follow the link already made for "Update 1".
    updates.sort_by(|a, b| a.created_utc.cmp(&b.created_utc).then_with(|| a.id.cmp(&b.id)));
    let update_ids: AHashSet<String> = updates.iter().map(|u| u.id.clone()).collect();

    let mut link_of: AHashMap<String, String> = AHashMap::new();
    let mut fetched: AHashMap<String, Option<Submission>> = AHashMap::new();
    let mut linked: Vec<(String, Submission)> = Vec::new();

    for update in updates {
        let mut original_id: Option<String> = None;

        for rid in referenced_ids(&update.selftext, &update.id) {
            if let Some(orig) = link_of.get(&rid) {
                original_id = Some(orig.clone());
                break;
            }
            if let Some(orig) = originals.get(&rid) {
                if same_author(orig, &update) {
                    original_id = Some(rid);
                    break;
                }
                continue;
            }
            if update_ids.contains(&rid) {
                continue;
            }
            let got = fetched.entry(rid.clone()).or_insert_with(|| match source.get_submission(&rid) {
                Ok(s) => Some(s),
                Err(ClientError::NotFound(_)) => Some(tombstone(&rid, update.created_utc)),
                Err(e) => {
                    tracing::warn!("could not fetch referenced post {}: {}", rid, e);
                    None
                }
            });
            if let Some(s) = got.clone() {
                // Gone posts are taken as they are; live ones must be the same author's original.
                let acceptable = s.is_unavailable()
                    || (same_author(&s, &update) && classifier.classify(&s) == PostKind::Original);
                if acceptable {
                    originals.entry(s.id.clone()).or_insert(s);
                    original_id = Some(rid);
                    break;
                }
            }
        }

        if original_id.is_none() {
            original_id = match_by_title(&update, originals.values()).map(|o| o.id.clone());
        }

        if original_id.is_none() && opts.search_fallback {
            let query = original_title_from_update(&update.title);
            if !query.is_empty() {
                match source.search_submissions(&opts.community, &query, SEARCH_LIMIT) {
                    Ok(hits) => {
                        let hits: Vec<Submission> =
                            hits.into_iter().filter(|s| classifier.classify(s) != PostKind::Update).collect();
                        if let Some(o) = match_by_title(&update, hits.iter()) {
                            original_id = Some(o.id.clone());
                            originals.entry(o.id.clone()).or_insert_with(|| o.clone());
                        }
                    }
                    Err(e) => {
                        tracing::warn!("search for '{}' failed: {}", query, e);
                        summary.bump(Outcome::Failed);
                    }
                }
            }
        }

        match original_id {
            Some(oid) => {
                link_of.insert(update.id.clone(), oid.clone());
                linked.push((oid, update));
            }
            None => {
                tracing::info!("no original found for update {} ({})", update.id, update.title);
                summary.bump(Outcome::Unlinked);
            }
        }
    }

    let now = now_epoch();
    let mut cases: BTreeMap<String, CaseEntry> = BTreeMap::new();
    for (oid, update) in linked {
        if let Some(orig) = originals.get(&oid) {
            cases.entry(oid.clone()).or_insert_with(|| CaseEntry::new(orig.clone(), now)).add_update(update);
        }
    }
    if !opts.require_update {
        for (id, orig) in originals {
            cases.entry(id).or_insert_with(|| CaseEntry::new(orig, now));
        }
    }
    cases.into_values().collect()
}

/// Most recent activity first, capped at `max_cases`.
fn select_cases(mut cases: Vec<CaseEntry>, opts: &SamplerOptions) -> Vec<CaseEntry> {
    let last_activity = |c: &CaseEntry| c.updates.iter().map(|u| u.created_utc).max().unwrap_or(c.created_utc);
    cases.sort_by(|a, b| last_activity(b).cmp(&last_activity(a)).then_with(|| a.case_id.cmp(&b.case_id)));
    cases.truncate(opts.max_cases);
    cases
}
