//! Title/flair heuristics for telling originals from updates, and the
//! deterministic rule that links an update to its original.

use crate::model::Submission;
use regex::Regex;
use std::sync::OnceLock;

/// Terms stripped from an update title to recover the original's title.
const TITLE_CLEANUP_TERMS: [&str; 4] = ["[update]", "(update)", "update", ":"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostKind {
    Original,
    Update,
    Other,
}

/// Flair filters applied on top of the title heuristics.
#[derive(Clone, Debug, Default)]
pub struct Classifier {
    pub update_flair: Option<String>,
    pub original_flair: Option<String>,
}

fn update_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bupdate[sd]?\b").expect("static regex"))
}

fn permalink_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:/r/[A-Za-z0-9_]+)?/comments/([a-z0-9]{4,12})\b|redd\.it/([a-z0-9]{4,12})\b")
            .expect("static regex")
    })
}

fn flair_eq(flair: Option<&str>, want: &str) -> bool {
    flair.map(|f| f.trim().eq_ignore_ascii_case(want.trim())).unwrap_or(false)
}

impl Classifier {
    pub fn new(update_flair: Option<String>, original_flair: Option<String>) -> Self {
        Self { update_flair, original_flair }
    }

    pub fn classify(&self, s: &Submission) -> PostKind {
        if s.stickied || s.distinguished || s.author.is_none() {
            return PostKind::Other;
        }
        let flair = s.flair.as_deref();
        let flair_says_update = match &self.update_flair {
            Some(want) => flair_eq(flair, want),
            None => flair.map(|f| update_word().is_match(f)).unwrap_or(false),
        };
        if flair_says_update || update_word().is_match(&s.title) {
            return PostKind::Update;
        }
        if !s.is_self {
            return PostKind::Other;
        }
        match &self.original_flair {
            Some(want) if !flair_eq(flair, want) => PostKind::Other,
            _ => PostKind::Original,
        }
    }
}

/// Lowercase, drop the update markers, collapse whitespace.
pub fn original_title_from_update(title: &str) -> String {
    let mut t = title.to_lowercase();
    for term in TITLE_CLEANUP_TERMS {
        t = t.replace(term, "");
    }
    normalize_title(&t)
}

/// Comparable form of a title: lowercase, punctuation-insensitive, single spaces.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Submission ids referenced by permalink or short link in `text`, in order of
/// appearance, excluding `self_id`.
pub fn referenced_ids(text: &str, self_id: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in permalink_re().captures_iter(text) {
        let id = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_lowercase());
        if let Some(id) = id {
            if id != self_id && !out.contains(&id) {
                out.push(id);
            }
        }
    }
    out
}

/// Whether `candidate` title-matches the cleaned update title.
pub fn titles_match(cleaned_update: &str, candidate_title: &str) -> bool {
    let cand = normalize_title(candidate_title);
    let upd = normalize_title(cleaned_update);
    if cand.is_empty() || upd.is_empty() {
        return false;
    }
    cand == upd || cand.contains(&upd) || upd.contains(&cand)
}

pub(crate) fn same_author(a: &Submission, b: &Submission) -> bool {
    match (a.author.as_deref(), b.author.as_deref()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}

/// Pick the original for `update` among `candidates` by title: same author,
/// posted before the update, earliest wins, ties broken by id.
pub fn match_by_title<'a>(update: &Submission, candidates: impl IntoIterator<Item = &'a Submission>) -> Option<&'a Submission> {
    let cleaned = original_title_from_update(&update.title);
    candidates
        .into_iter()
        .filter(|c| c.id != update.id)
        .filter(|c| same_author(c, update))
        .filter(|c| c.created_utc < update.created_utc)
        .filter(|c| titles_match(&cleaned, &c.title))
        .min_by(|a, b| a.created_utc.cmp(&b.created_utc).then_with(|| a.id.cmp(&b.id)))
}
