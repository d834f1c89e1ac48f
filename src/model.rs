//! Core records shared by every stage: submissions, the raw comment forest as
//! returned upstream, and the flattened per-comment row written to datasets.

use serde::{Deserialize, Serialize};

/// Author handles the platform substitutes for gone accounts/content.
const DELETED: &str = "[deleted]";
const REMOVED: &str = "[removed]";

/// A post in the community.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub author: Option<String>,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub score: i64,
    pub created_utc: i64,
    #[serde(default)]
    pub flair: Option<String>,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub distinguished: bool,
}

impl Submission {
    /// The post's content is gone: a tombstone body, or no author and no body.
    pub fn is_unavailable(&self) -> bool {
        let body = self.selftext.trim();
        body == DELETED || body == REMOVED || (self.author.is_none() && body.is_empty())
    }

    pub fn fullname(&self) -> String {
        format!("t3_{}", self.id)
    }
}

/// Classifies an author handle. `None` and the tombstones count as gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorStatus {
    Present,
    Deleted,
    Removed,
}

impl AuthorStatus {
    pub fn classify(author: Option<&str>, body: &str) -> Self {
        let body = body.trim();
        match author.map(str::trim) {
            None | Some("") | Some(DELETED) => {
                if body == REMOVED { AuthorStatus::Removed } else { AuthorStatus::Deleted }
            }
            Some(REMOVED) => AuthorStatus::Removed,
            Some(_) if body == REMOVED => AuthorStatus::Removed,
            Some(_) => AuthorStatus::Present,
        }
    }

    pub fn is_present(self) -> bool {
        self == AuthorStatus::Present
    }
}

/// One node of a submission's comment forest as delivered upstream.
#[derive(Clone, Debug, PartialEq)]
pub enum ForestNode {
    Comment(RawComment),
    More(MoreStub),
}

impl ForestNode {
    pub fn id(&self) -> &str {
        match self {
            ForestNode::Comment(c) => &c.id,
            ForestNode::More(m) => &m.id,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawComment {
    pub id: String,
    /// Fullname of the parent: `t3_<id>` for a submission, `t1_<id>` for a comment.
    pub parent_id: String,
    pub author: Option<String>,
    pub body: String,
    /// `None` when the platform hides the score.
    pub score: Option<i64>,
    pub created_utc: i64,
    pub replies: Vec<ForestNode>,
}

/// Placeholder for replies that were not inlined. An empty `children` list is
/// the "continue this thread" variant, which can only be resolved by
/// re-fetching the thread rooted at the parent comment.
#[derive(Clone, Debug, PartialEq)]
pub struct MoreStub {
    pub id: String,
    pub parent_id: String,
    pub count: u64,
    pub children: Vec<String>,
}

impl MoreStub {
    pub fn is_continue_thread(&self) -> bool {
        self.children.is_empty()
    }
}

/// Which post of a case a comment belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionRole {
    Original,
    Update,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    Submission,
    Comment,
}

/// One flattened comment. Field order is the dataset's column order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRow {
    pub case_id: String,
    pub submission_id: String,
    pub role: SubmissionRole,
    pub comment_id: String,
    /// Bare id of the parent (no `t1_`/`t3_` prefix).
    pub parent_id: String,
    pub parent_kind: ParentKind,
    pub depth: u32,
    pub author: Option<String>,
    pub author_status: AuthorStatus,
    pub score: Option<i64>,
    pub created_utc: i64,
    pub body: String,
    /// Some replies below this comment could not be loaded.
    pub replies_incomplete: bool,
}

impl CommentRow {
    /// Score that may enter averages: author still present and score visible.
    pub fn countable_score(&self) -> Option<i64> {
        if self.author_status.is_present() { self.score } else { None }
    }

    pub fn is_reply(&self) -> bool {
        self.parent_kind == ParentKind::Comment
    }
}

/// Split a Reddit fullname (`t1_abc`) into kind prefix and bare id.
pub fn split_fullname(fullname: &str) -> (Option<&str>, &str) {
    match fullname.split_once('_') {
        Some((kind, id)) if kind.len() == 2 && kind.starts_with('t') => (Some(kind), id),
        _ => (None, fullname),
    }
}
