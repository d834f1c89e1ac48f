//! The manifest: every known case with its processing status, one JSON
//! object per line in `manifest.jsonl`.

use crate::model::Submission;
use crate::ndjson::{read_records, write_records_atomic};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Sampled, not yet processed.
    Pending,
    Processed,
    /// The original is deleted or gone; kept so reports can show a placeholder.
    Unavailable,
    /// Last processing attempt hit a transient failure; retried next run.
    Failed,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CaseStatus::Pending => "pending",
            CaseStatus::Processed => "processed",
            CaseStatus::Unavailable => "unavailable",
            CaseStatus::Failed => "failed",
        }
    }
}

/// One relationship story: an original submission and its chronologically
/// ordered updates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseEntry {
    pub case_id: String,
    pub status: CaseStatus,
    pub created_utc: i64,
    pub original: Submission,
    #[serde(default)]
    pub updates: Vec<Submission>,
    pub sampled_at: i64,
}

impl CaseEntry {
    pub fn new(original: Submission, sampled_at: i64) -> Self {
        let status = if original.is_unavailable() { CaseStatus::Unavailable } else { CaseStatus::Pending };
        Self {
            case_id: original.id.clone(),
            status,
            created_utc: original.created_utc,
            original,
            updates: Vec::new(),
            sampled_at,
        }
    }

    /// Append `update` unless already present (then refresh its score), and
    /// keep updates ordered by posting time. Returns true when it was new.
    pub fn add_update(&mut self, update: Submission) -> bool {
        if update.id == self.case_id {
            return false;
        }
        let is_new = match self.updates.iter_mut().find(|u| u.id == update.id) {
            Some(existing) => {
                existing.score = update.score;
                existing.num_comments = update.num_comments;
                existing.upvote_ratio = update.upvote_ratio;
                false
            }
            None => {
                self.updates.push(update);
                true
            }
        };
        self.updates.sort_by(|a, b| a.created_utc.cmp(&b.created_utc).then_with(|| a.id.cmp(&b.id)));
        is_new
    }

    /// Structural checks not expressible in the serde schema.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.case_id.trim().is_empty() {
            return Err("empty case_id".into());
        }
        if self.original.id != self.case_id {
            return Err(format!("case_id {} does not match original id {}", self.case_id, self.original.id));
        }
        Ok(())
    }
}

/// All cases keyed by id. Iteration order is by case id, so the file on disk
/// is stable across runs.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    cases: BTreeMap<String, CaseEntry>,
    /// Lines skipped on load because they were malformed.
    pub skipped_on_load: usize,
}

/// What a merge did to the manifest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub updated: usize,
}

impl Manifest {
    /// Load `path`; a missing file is an empty manifest. Malformed lines and
    /// entries failing validation are skipped and counted.
    pub fn load(path: &Path) -> Result<Self> {
        let mut m = Manifest::default();
        if !path.exists() {
            return Ok(m);
        }
        let recs = read_records::<CaseEntry>(path)?;
        m.skipped_on_load = recs.malformed.len();
        for entry in recs.items {
            if let Err(why) = entry.validate() {
                tracing::warn!("{}: skipping manifest entry: {}", path.display(), why);
                m.skipped_on_load += 1;
                continue;
            }
            if m.cases.contains_key(&entry.case_id) {
                tracing::warn!("{}: duplicate case {} (keeping the first)", path.display(), entry.case_id);
                m.skipped_on_load += 1;
                continue;
            }
            m.cases.insert(entry.case_id.clone(), entry);
        }
        Ok(m)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_records_atomic(path, self.cases.values())?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn get(&self, case_id: &str) -> Option<&CaseEntry> {
        self.cases.get(case_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CaseEntry> {
        self.cases.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.cases.keys().cloned().collect()
    }

    pub fn set_status(&mut self, case_id: &str, status: CaseStatus) {
        if let Some(c) = self.cases.get_mut(case_id) {
            c.status = status;
        }
    }

    /// Merge one sampled case by id. Existing entries keep `sampled_at`, gain
    /// new updates, and get refreshed scores. Their status is kept unless new
    /// updates arrived, which sends an available case back to `pending`.
    pub fn merge(&mut self, incoming: CaseEntry) -> MergeOutcome {
        match self.cases.get_mut(&incoming.case_id) {
            None => {
                self.cases.insert(incoming.case_id.clone(), incoming);
                MergeOutcome { added: 1, updated: 0 }
            }
            Some(existing) => {
                let mut changed = existing.original.score != incoming.original.score
                    || existing.original.num_comments != incoming.original.num_comments;
                existing.original.score = incoming.original.score;
                existing.original.num_comments = incoming.original.num_comments;
                existing.original.upvote_ratio = incoming.original.upvote_ratio;
                if incoming.status == CaseStatus::Unavailable && existing.status != CaseStatus::Unavailable {
                    existing.status = CaseStatus::Unavailable;
                    changed = true;
                }
                let mut new_updates = false;
                for u in incoming.updates {
                    new_updates |= existing.add_update(u);
                }
                // New updates bring new comment forests; the case has to be processed again.
                if new_updates && existing.status != CaseStatus::Unavailable {
                    existing.status = CaseStatus::Pending;
                }
                changed |= new_updates;
                MergeOutcome { added: 0, updated: usize::from(changed) }
            }
        }
    }
}
