//! Per-case engagement metrics, computed in one pass over the flattened rows.

use crate::date::now_epoch;
use crate::manifest::CaseEntry;
use crate::model::{AuthorStatus, CommentRow, Submission, SubmissionRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthBucket {
    pub count: u64,
    /// Rows whose score entered `score_sum`.
    pub scored: u64,
    pub score_sum: i64,
    pub mean: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMetrics {
    pub submission_id: String,
    pub role: SubmissionRole,
    pub comments: u64,
    /// Comments written by the submission's own author.
    pub op_comments: u64,
    /// `op_comments / comments`, rounded to three places; 0 when there are no comments.
    pub op_response_ratio: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub case_id: String,
    pub total_comments: u64,
    pub total_replies: u64,
    pub max_depth: u32,
    /// Mean score over comments with a present author and a visible score.
    pub average_score: Option<f64>,
    pub scored_comments: u64,
    pub deleted_comments: u64,
    pub hidden_scores: u64,
    pub incomplete_subtrees: u64,
    pub score_by_depth: BTreeMap<u32, DepthBucket>,
    pub submissions: Vec<SubmissionMetrics>,
    pub computed_at: i64,
}

pub fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 1000.0
}

fn same_user(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x.eq_ignore_ascii_case(y))
}

struct SubmissionTally {
    id: String,
    author: Option<String>,
    role: SubmissionRole,
    comments: u64,
    op_comments: u64,
}

/// Running totals; `ingest` once per row, then `finish`.
struct MetricAccumulator {
    total: u64,
    replies: u64,
    max_depth: u32,
    score_sum: i64,
    scored: u64,
    deleted: u64,
    hidden: u64,
    by_depth: BTreeMap<u32, DepthBucket>,
    /// Case order: original first, then updates chronologically.
    per_submission: Vec<SubmissionTally>,
}

impl MetricAccumulator {
    fn new(case: &CaseEntry) -> Self {
        let tally = |s: &Submission, role| SubmissionTally {
            id: s.id.clone(),
            author: s.author.clone(),
            role,
            comments: 0,
            op_comments: 0,
        };
        let mut per_submission = vec![tally(&case.original, SubmissionRole::Original)];
        per_submission.extend(case.updates.iter().map(|u| tally(u, SubmissionRole::Update)));
        Self {
            total: 0,
            replies: 0,
            max_depth: 0,
            score_sum: 0,
            scored: 0,
            deleted: 0,
            hidden: 0,
            by_depth: BTreeMap::new(),
            per_submission,
        }
    }

    fn ingest(&mut self, row: &CommentRow) {
        self.total += 1;
        if row.is_reply() {
            self.replies += 1;
        }
        self.max_depth = self.max_depth.max(row.depth);
        if row.author_status != AuthorStatus::Present {
            self.deleted += 1;
        }
        if row.score.is_none() {
            self.hidden += 1;
        }
        let bucket = self.by_depth.entry(row.depth).or_default();
        bucket.count += 1;
        if let Some(s) = row.countable_score() {
            self.score_sum += s;
            self.scored += 1;
            bucket.score_sum += s;
            bucket.scored += 1;
        }
        let idx = match self.per_submission.iter().position(|t| t.id == row.submission_id) {
            Some(i) => i,
            None => {
                self.per_submission.push(SubmissionTally {
                    id: row.submission_id.clone(),
                    author: None,
                    role: row.role,
                    comments: 0,
                    op_comments: 0,
                });
                self.per_submission.len() - 1
            }
        };
        let tally = &mut self.per_submission[idx];
        tally.comments += 1;
        if same_user(row.author.as_deref(), tally.author.as_deref()) {
            tally.op_comments += 1;
        }
    }

    fn finish(self, case_id: &str, incomplete_subtrees: u64) -> MetricRecord {
        let mut score_by_depth = self.by_depth;
        for b in score_by_depth.values_mut() {
            b.mean = (b.scored > 0).then(|| b.score_sum as f64 / b.scored as f64);
        }
        let submissions = self
            .per_submission
            .into_iter()
            .map(|t| SubmissionMetrics {
                submission_id: t.id,
                role: t.role,
                comments: t.comments,
                op_comments: t.op_comments,
                op_response_ratio: ratio(t.op_comments, t.comments),
            })
            .collect();
        MetricRecord {
            case_id: case_id.to_string(),
            total_comments: self.total,
            total_replies: self.replies,
            max_depth: self.max_depth,
            average_score: (self.scored > 0).then(|| self.score_sum as f64 / self.scored as f64),
            scored_comments: self.scored,
            deleted_comments: self.deleted,
            hidden_scores: self.hidden,
            incomplete_subtrees,
            score_by_depth,
            submissions,
            computed_at: now_epoch(),
        }
    }
}

/// Metrics for `case` over its flattened `rows`.
pub fn compute(case: &CaseEntry, rows: &[CommentRow], incomplete_subtrees: u64) -> MetricRecord {
    let mut acc = MetricAccumulator::new(case);
    for row in rows {
        acc.ingest(row);
    }
    acc.finish(&case.case_id, incomplete_subtrees)
}
