//! Rebuilds reply trees from flat dataset rows and ranks top-level threads.

use crate::metrics::ratio;
use crate::model::{AuthorStatus, CommentRow, ParentKind};
use ahash::AHashMap;

/// Engagement of one top-level comment and everything below it.
#[derive(Clone, Debug, PartialEq)]
pub struct Thread {
    /// Index of the top-level row.
    pub root: usize,
    pub replies: u64,
    /// Replies in the thread written by the submission's author.
    pub op_replies: u64,
    pub op_response_ratio: f64,
}

/// Reply structure of one submission's rows. Indices point into the case's row slice.
pub struct CommentTree<'a> {
    rows: &'a [CommentRow],
    top: Vec<usize>,
    children: AHashMap<&'a str, Vec<usize>>,
}

impl<'a> CommentTree<'a> {
    pub fn build(rows: &'a [CommentRow], submission_id: &str) -> Self {
        let mut top = Vec::new();
        let mut children: AHashMap<&'a str, Vec<usize>> = AHashMap::new();
        for (i, r) in rows.iter().enumerate() {
            if r.submission_id != submission_id {
                continue;
            }
            match r.parent_kind {
                ParentKind::Submission => top.push(i),
                ParentKind::Comment => children.entry(r.parent_id.as_str()).or_default().push(i),
            }
        }
        Self { rows, top, children }
    }

    pub fn row(&self, idx: usize) -> &'a CommentRow {
        &self.rows[idx]
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        self.children.get(self.rows[idx].comment_id.as_str()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stats for every top-level comment, in listing order.
    pub fn threads(&self, op: Option<&str>) -> Vec<Thread> {
        self.top
            .iter()
            .map(|&root| {
                let (mut replies, mut op_replies) = (0u64, 0u64);
                let mut stack: Vec<usize> = self.children(root).to_vec();
                while let Some(i) = stack.pop() {
                    replies += 1;
                    let r = &self.rows[i];
                    if is_op(r, op) {
                        op_replies += 1;
                    }
                    stack.extend_from_slice(self.children(i));
                }
                Thread { root, replies, op_replies, op_response_ratio: ratio(op_replies, replies) }
            })
            .collect()
    }

    /// Threads the author took part in, highest response ratio first.
    pub fn most_engaged(&self, op: Option<&str>) -> Vec<Thread> {
        let mut out: Vec<Thread> = self
            .threads(op)
            .into_iter()
            .filter(|t| t.op_replies > 0 && self.rows[t.root].author_status == AuthorStatus::Present)
            .collect();
        out.sort_by(|a, b| {
            b.op_response_ratio
                .total_cmp(&a.op_response_ratio)
                .then_with(|| self.rows[a.root].created_utc.cmp(&self.rows[b.root].created_utc))
                .then_with(|| self.rows[a.root].comment_id.cmp(&self.rows[b.root].comment_id))
        });
        out
    }

    /// The `n` best-scored threads the author never replied in.
    pub fn top_scored(&self, op: Option<&str>, n: usize) -> Vec<Thread> {
        let mut out: Vec<Thread> = self.threads(op).into_iter().filter(|t| t.op_replies == 0).collect();
        out.sort_by(|a, b| {
            self.rows[b.root]
                .score
                .cmp(&self.rows[a.root].score)
                .then_with(|| self.rows[a.root].comment_id.cmp(&self.rows[b.root].comment_id))
        });
        out.truncate(n);
        out
    }
}

fn is_op(row: &CommentRow, op: Option<&str>) -> bool {
    match (row.author.as_deref(), op) {
        (Some(a), Some(o)) => row.author_status.is_present() && a.eq_ignore_ascii_case(o),
        _ => false,
    }
}
