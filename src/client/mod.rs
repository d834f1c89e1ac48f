//! Upstream content API seam. Stages only talk to [`ContentSource`]; the
//! production implementation is [`RedditClient`].

mod error;
mod ratelimit;
mod reddit;
pub mod wire;

pub use error::{ClientError, ClientResult};
pub use ratelimit::RateLimiter;
pub use reddit::RedditClient;

use crate::model::{ForestNode, MoreStub, Submission};
use std::fmt;
use std::str::FromStr;

/// Listing order for a community's submissions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListingSort {
    New,
    Hot,
    Top(TopWindow),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopWindow {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TopWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            TopWindow::Day => "day",
            TopWindow::Week => "week",
            TopWindow::Month => "month",
            TopWindow::Year => "year",
            TopWindow::All => "all",
        }
    }
}

impl ListingSort {
    /// Path segment under `/r/<community>/`.
    pub fn path(self) -> &'static str {
        match self {
            ListingSort::New => "new",
            ListingSort::Hot => "hot",
            ListingSort::Top(_) => "top",
        }
    }

    /// Whether the listing is strictly newest-first, which allows early stop on a date cutoff.
    pub fn is_chronological(self) -> bool {
        self == ListingSort::New
    }
}

impl fmt::Display for ListingSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingSort::Top(w) => write!(f, "top:{}", w.as_str()),
            other => f.write_str(other.path()),
        }
    }
}

impl FromStr for ListingSort {
    type Err = String;
    /// Accepts `new`, `hot`, `top` (month window) or `top:<day|week|month|year|all>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (kind, window) = match s.split_once(':') {
            Some((k, w)) => (k.to_string(), Some(w.to_string())),
            None => (s.clone(), None),
        };
        match (kind.as_str(), window.as_deref()) {
            ("new", None) => Ok(ListingSort::New),
            ("hot", None) => Ok(ListingSort::Hot),
            ("top", None) | ("top", Some("month")) => Ok(ListingSort::Top(TopWindow::Month)),
            ("top", Some("day")) => Ok(ListingSort::Top(TopWindow::Day)),
            ("top", Some("week")) => Ok(ListingSort::Top(TopWindow::Week)),
            ("top", Some("year")) => Ok(ListingSort::Top(TopWindow::Year)),
            ("top", Some("all")) => Ok(ListingSort::Top(TopWindow::All)),
            _ => Err(format!("unknown listing sort '{s}' (expected new, hot, top or top:<window>)")),
        }
    }
}

/// One page of a listing. Entries that could not be decoded are counted, not returned.
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub submissions: Vec<Submission>,
    pub malformed: usize,
    /// Cursor for the next page; `None` at the end of the listing.
    pub after: Option<String>,
}

/// Read access to a community's submissions and comment trees.
///
/// Implementations must be shareable across worker threads; any request
/// pacing lives inside the implementation.
pub trait ContentSource: Sync {
    fn list_submissions(
        &self,
        community: &str,
        sort: ListingSort,
        limit: usize,
        after: Option<&str>,
    ) -> ClientResult<Page>;

    /// Search `community` for submissions matching `query`.
    fn search_submissions(&self, community: &str, query: &str, limit: usize) -> ClientResult<Vec<Submission>>;

    fn get_submission(&self, id: &str) -> ClientResult<Submission>;

    /// Top-level comment forest of a submission, with replies inlined down to `expand_depth`.
    fn get_comment_forest(&self, submission_id: &str, expand_depth: u32) -> ClientResult<Vec<ForestNode>>;

    /// Load what a "more replies" placeholder stands for. The returned nodes
    /// are the stub's siblings-to-be: children of `stub.parent_id`.
    fn expand_more(&self, submission_id: &str, stub: &MoreStub) -> ClientResult<Vec<ForestNode>>;
}
