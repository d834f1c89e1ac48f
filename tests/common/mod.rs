#![allow(dead_code)]

use relcases::client::{ClientError, ClientResult, ContentSource, ListingSort, Page};
use relcases::{DataLayout, ForestNode, MoreStub, RawComment, Submission};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// In-memory stand-in for the Reddit API.
///
/// - `listing` is served newest-first in pages, the cursor being the last id handed out.
/// - `posts` backs `get_submission`; listing entries are found there too.
/// - `forests` maps a submission id to its top-level comment forest.
/// - `more` maps a "more" stub id to what expanding it yields.
/// - ids in `failing` answer every call about them with a transient error.
#[derive(Default)]
pub struct FixtureSource {
    pub listing: Vec<Submission>,
    pub posts: HashMap<String, Submission>,
    pub forests: HashMap<String, Vec<ForestNode>>,
    pub more: HashMap<String, Vec<ForestNode>>,
    pub search_hits: Vec<Submission>,
    pub failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a post to the listing (and to the lookup table).
    pub fn list(mut self, s: Submission) -> Self {
        self.posts.insert(s.id.clone(), s.clone());
        self.listing.push(s);
        self
    }

    /// Make a post reachable by id without listing it.
    pub fn hidden(mut self, s: Submission) -> Self {
        self.posts.insert(s.id.clone(), s);
        self
    }

    pub fn forest(mut self, submission_id: &str, nodes: Vec<ForestNode>) -> Self {
        self.forests.insert(submission_id.to_string(), nodes);
        self
    }

    pub fn more(mut self, stub_id: &str, nodes: Vec<ForestNode>) -> Self {
        self.more.insert(stub_id.to_string(), nodes);
        self
    }

    pub fn search_hit(mut self, s: Submission) -> Self {
        self.posts.insert(s.id.clone(), s.clone());
        self.search_hits.push(s);
        self
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn check(&self, id: &str) -> ClientResult<()> {
        if self.failing.contains(id) {
            return Err(ClientError::Transient(format!("{id}: 503 Service Unavailable")));
        }
        Ok(())
    }
}

impl ContentSource for FixtureSource {
    fn list_submissions(
        &self,
        _community: &str,
        _sort: ListingSort,
        limit: usize,
        after: Option<&str>,
    ) -> ClientResult<Page> {
        self.log(format!("list:{}", after.unwrap_or("")));
        let start = match after {
            Some(a) => self.listing.iter().position(|s| s.id == a).map(|i| i + 1).unwrap_or(self.listing.len()),
            None => 0,
        };
        let end = (start + limit).min(self.listing.len());
        let submissions: Vec<Submission> = self.listing[start..end].to_vec();
        let after = if end < self.listing.len() { submissions.last().map(|s| s.id.clone()) } else { None };
        Ok(Page { submissions, malformed: 0, after })
    }

    fn search_submissions(&self, _community: &str, query: &str, limit: usize) -> ClientResult<Vec<Submission>> {
        self.log(format!("search:{query}"));
        Ok(self.search_hits.iter().take(limit).cloned().collect())
    }

    fn get_submission(&self, id: &str) -> ClientResult<Submission> {
        self.log(format!("get:{id}"));
        self.check(id)?;
        self.posts.get(id).cloned().ok_or_else(|| ClientError::NotFound(format!("/comments/{id}: 404 Not Found")))
    }

    fn get_comment_forest(&self, submission_id: &str, _expand_depth: u32) -> ClientResult<Vec<ForestNode>> {
        self.log(format!("forest:{submission_id}"));
        self.check(submission_id)?;
        if !self.posts.contains_key(submission_id) {
            return Err(ClientError::NotFound(submission_id.to_string()));
        }
        Ok(self.forests.get(submission_id).cloned().unwrap_or_default())
    }

    fn expand_more(&self, _submission_id: &str, stub: &MoreStub) -> ClientResult<Vec<ForestNode>> {
        self.log(format!("more:{}", stub.id));
        self.check(&stub.id)?;
        Ok(self.more.get(&stub.id).cloned().unwrap_or_default())
    }
}

/// A self post with sensible defaults.
pub fn post(id: &str, author: &str, title: &str, created_utc: i64) -> Submission {
    Submission {
        id: id.to_string(),
        author: Some(author.to_string()),
        title: title.to_string(),
        selftext: format!("body of {id}"),
        score: 100,
        created_utc,
        flair: None,
        permalink: format!("/r/relationships/comments/{id}/slug/"),
        num_comments: 0,
        upvote_ratio: Some(0.95),
        is_self: true,
        stickied: false,
        distinguished: false,
    }
}

/// The shape the API returns for a deleted post.
pub fn deleted_post(id: &str, title: &str, created_utc: i64) -> Submission {
    Submission { author: None, selftext: "[deleted]".to_string(), ..post(id, "gone", title, created_utc) }
}

pub fn comment(id: &str, parent: &str, author: &str, score: i64, replies: Vec<ForestNode>) -> ForestNode {
    ForestNode::Comment(RawComment {
        id: id.to_string(),
        parent_id: parent.to_string(),
        author: Some(author.to_string()),
        body: format!("comment {id}"),
        score: Some(score),
        created_utc: 1_700_000_000,
        replies,
    })
}

/// A comment whose score the platform hides.
pub fn unscored_comment(id: &str, parent: &str, author: &str, replies: Vec<ForestNode>) -> ForestNode {
    ForestNode::Comment(RawComment {
        id: id.to_string(),
        parent_id: parent.to_string(),
        author: Some(author.to_string()),
        body: format!("comment {id}"),
        score: None,
        created_utc: 1_700_000_000,
        replies,
    })
}

/// A comment whose account was deleted: no author, tombstone body.
pub fn deleted_comment(id: &str, parent: &str, score: i64) -> ForestNode {
    ForestNode::Comment(RawComment {
        id: id.to_string(),
        parent_id: parent.to_string(),
        author: None,
        body: "[deleted]".to_string(),
        score: Some(score),
        created_utc: 1_700_000_000,
        replies: Vec::new(),
    })
}

pub fn stub(id: &str, parent: &str, children: &[&str]) -> ForestNode {
    ForestNode::More(MoreStub {
        id: id.to_string(),
        parent_id: parent.to_string(),
        count: children.len() as u64,
        children: children.iter().map(|c| c.to_string()).collect(),
    })
}

/// Fresh data directory; keep the `TempDir` alive for the test's duration.
pub fn data_dir() -> (tempfile::TempDir, DataLayout) {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path().join("data"));
    (dir, layout)
}

/// Files under `dir` whose name marks them as unfinished writes.
pub fn leftover_tmp_files(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with(relcases::TMP_SUFFIX))
        .collect()
}

/// Non-empty lines of a text file.
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path).unwrap().lines().filter(|l| !l.trim().is_empty()).map(String::from).collect()
}
