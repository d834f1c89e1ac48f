//! Flattening of comment forests into dataset rows.
//!
//! Walks with an explicit stack so arbitrarily deep threads cannot overflow
//! the call stack. Depth always comes from the structural parent, so
//! `depth(child) == depth(parent) + 1` holds for every emitted row.

use crate::client::ContentSource;
use crate::config::TraversalLimits;
use crate::model::{AuthorStatus, CommentRow, ForestNode, ParentKind, SubmissionRole};
use ahash::AHashSet;

/// Rows of one case plus what could not be loaded.
#[derive(Debug, Default)]
pub struct Flattened {
    pub rows: Vec<CommentRow>,
    pub incomplete_subtrees: u64,
    pub expansions: usize,
}

struct Frame {
    node: ForestNode,
    /// Index of the parent row in `rows`; `None` for top-level comments.
    parent_row: Option<usize>,
}

/// Per-case traversal state. Budgets span every submission of the case.
pub struct Traversal<'a> {
    source: &'a dyn ContentSource,
    case_id: String,
    limits: TraversalLimits,
    visited: AHashSet<String>,
    expanded: AHashSet<(String, String)>,
    out: Flattened,
}

impl<'a> Traversal<'a> {
    pub fn new(source: &'a dyn ContentSource, case_id: &str, limits: TraversalLimits) -> Self {
        Self {
            source,
            case_id: case_id.to_string(),
            limits,
            visited: AHashSet::new(),
            expanded: AHashSet::new(),
            out: Flattened::default(),
        }
    }

    /// Append the rows of one submission's forest, in pre-order.
    pub fn flatten(&mut self, submission_id: &str, role: SubmissionRole, forest: Vec<ForestNode>) {
        let mut stack: Vec<Frame> = forest.into_iter().rev().map(|node| Frame { node, parent_row: None }).collect();
        // Losses directly under the submission have no row to flag; count them once.
        let mut top_incomplete = false;

        while let Some(Frame { node, parent_row }) = stack.pop() {
            let depth = match parent_row {
                Some(i) => self.out.rows[i].depth + 1,
                None => 0,
            };
            match node {
                ForestNode::Comment(c) => {
                    if !self.visited.insert(c.id.clone()) {
                        tracing::debug!("{}: comment {} seen twice, skipping", self.case_id, c.id);
                        continue;
                    }
                    if depth > self.limits.max_depth || self.out.rows.len() >= self.limits.node_budget {
                        self.mark_incomplete(parent_row, &mut top_incomplete);
                        continue;
                    }
                    let (parent_id, parent_kind) = match parent_row {
                        Some(i) => (self.out.rows[i].comment_id.clone(), ParentKind::Comment),
                        None => (submission_id.to_string(), ParentKind::Submission),
                    };
                    let author_status = AuthorStatus::classify(c.author.as_deref(), &c.body);
                    let idx = self.out.rows.len();
                    self.out.rows.push(CommentRow {
                        case_id: self.case_id.clone(),
                        submission_id: submission_id.to_string(),
                        role,
                        comment_id: c.id,
                        parent_id,
                        parent_kind,
                        depth,
                        author: if author_status.is_present() { c.author } else { None },
                        author_status,
                        score: c.score,
                        created_utc: c.created_utc,
                        body: c.body,
                        replies_incomplete: false,
                    });
                    for child in c.replies.into_iter().rev() {
                        stack.push(Frame { node: child, parent_row: Some(idx) });
                    }
                }
                ForestNode::More(stub) => {
                    let key = (stub.parent_id.clone(), stub.id.clone());
                    if self.expanded.contains(&key) {
                        tracing::debug!("{}: replies under {} already expanded", self.case_id, stub.parent_id);
                        continue;
                    }
                    if self.out.expansions >= self.limits.expand_budget {
                        self.mark_incomplete(parent_row, &mut top_incomplete);
                        continue;
                    }
                    self.expanded.insert(key);
                    self.out.expansions += 1;
                    match self.source.expand_more(submission_id, &stub) {
                        Ok(nodes) => {
                            for n in nodes.into_iter().rev() {
                                stack.push(Frame { node: n, parent_row });
                            }
                        }
                        Err(e) => {
                            tracing::warn!("{}: could not expand replies under {}: {}", self.case_id, stub.parent_id, e);
                            self.mark_incomplete(parent_row, &mut top_incomplete);
                        }
                    }
                }
            }
        }
    }

    fn mark_incomplete(&mut self, parent_row: Option<usize>, top_incomplete: &mut bool) {
        match parent_row {
            Some(i) => {
                let row = &mut self.out.rows[i];
                if !row.replies_incomplete {
                    row.replies_incomplete = true;
                    self.out.incomplete_subtrees += 1;
                }
            }
            None if !*top_incomplete => {
                *top_incomplete = true;
                self.out.incomplete_subtrees += 1;
            }
            None => {}
        }
    }

    pub fn finish(self) -> Flattened {
        self.out
    }
}
