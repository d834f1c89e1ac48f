//! Per-run counters by outcome category, logged at the end of a stage and
//! persisted under `runs/<stage>.summary.json`.

use crate::date::now_epoch;
use crate::paths::DataLayout;
use crate::util::write_json_atomic;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Case sampled, processed, or rendered.
    Completed,
    /// Already done on a previous run.
    SkippedExisting,
    /// Deleted or missing content, recorded as a status.
    Unavailable,
    /// Transient upstream failure after retries.
    Failed,
    /// Record that did not match its schema.
    Malformed,
    /// Comment subtree that could not be fully loaded.
    IncompleteSubtree,
    /// Update whose original could not be found.
    Unlinked,
    /// Listing entry that is neither an original nor an update.
    Ignored,
    /// Case rendered as a placeholder because its outputs are missing.
    Placeholder,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::SkippedExisting => "skipped_existing",
            Outcome::Unavailable => "unavailable",
            Outcome::Failed => "failed",
            Outcome::Malformed => "malformed",
            Outcome::IncompleteSubtree => "incomplete_subtree",
            Outcome::Unlinked => "unlinked",
            Outcome::Ignored => "ignored",
            Outcome::Placeholder => "placeholder",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub stage: String,
    pub started_at: i64,
    pub finished_at: i64,
    pub counts: BTreeMap<Outcome, u64>,
}

impl RunSummary {
    pub fn new(stage: &str) -> Self {
        Self { stage: stage.to_string(), started_at: now_epoch(), finished_at: 0, counts: BTreeMap::new() }
    }

    pub fn add(&mut self, outcome: Outcome, n: u64) {
        if n > 0 {
            *self.counts.entry(outcome).or_insert(0) += n;
        }
    }

    pub fn bump(&mut self, outcome: Outcome) {
        self.add(outcome, 1);
    }

    pub fn count(&self, outcome: Outcome) -> u64 {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    pub fn merge(&mut self, other: RunSummary) {
        for (k, v) in other.counts {
            self.add(k, v);
        }
    }

    /// Log the counts and persist them next to the data.
    pub fn finish(mut self, layout: &DataLayout) -> Result<Self> {
        self.finished_at = now_epoch();
        let parts: Vec<String> = self
            .counts
            .iter()
            .map(|(k, v)| format!("{}={}", k.as_str(), v))
            .collect();
        tracing::info!("{} finished: {}", self.stage, if parts.is_empty() { "nothing to do".to_string() } else { parts.join(" ") });
        write_json_atomic(&layout.run_summary(&self.stage), &self)?;
        Ok(self)
    }
}
