//! Decoding of Reddit's JSON "thing" envelopes into the crate's model.
//!
//! Decoding works on `serde_json::Value` because the envelopes are loose:
//! `replies` is either `""` or a listing, `edited` is bool or number,
//! `created_utc` is a float.

use super::{ClientError, ClientResult, Page};
use crate::model::{split_fullname, ForestNode, MoreStub, RawComment, Submission};
use ahash::AHashMap;
use serde_json::Value;

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(|x| x.as_str()).map(|s| s.to_string())
}

fn i64_field(v: &Value, key: &str) -> Option<i64> {
    v.get(key).and_then(|x| x.as_i64().or_else(|| x.as_f64().map(|f| f as i64)))
}

/// `None` for missing, null, and tombstone authors.
fn author_field(v: &Value) -> Option<String> {
    str_field(v, "author").filter(|a| {
        let a = a.trim();
        !a.is_empty() && a != "[deleted]" && a != "[removed]"
    })
}

fn listing_children(v: &Value) -> Option<&Vec<Value>> {
    v.get("data").and_then(|d| d.get("children")).and_then(|c| c.as_array())
}

/// Decode the `data` object of a `t3` thing.
pub fn submission_from_data(d: &Value) -> Option<Submission> {
    let id = str_field(d, "id")?;
    let title = str_field(d, "title")?;
    Some(Submission {
        id,
        author: author_field(d),
        title,
        selftext: str_field(d, "selftext").unwrap_or_default(),
        score: i64_field(d, "score").unwrap_or(0),
        created_utc: i64_field(d, "created_utc")?,
        flair: str_field(d, "link_flair_text").filter(|s| !s.trim().is_empty()),
        permalink: str_field(d, "permalink").unwrap_or_default(),
        num_comments: d.get("num_comments").and_then(|x| x.as_u64()).unwrap_or(0),
        upvote_ratio: d.get("upvote_ratio").and_then(|x| x.as_f64()),
        is_self: d.get("is_self").and_then(|x| x.as_bool()).unwrap_or(false),
        stickied: d.get("stickied").and_then(|x| x.as_bool()).unwrap_or(false),
        distinguished: d.get("distinguished").map(|x| !x.is_null()).unwrap_or(false),
    })
}

/// Decode a submission listing page. Non-`t3` children and undecodable
/// entries are counted as malformed.
pub fn parse_listing(v: &Value) -> ClientResult<Page> {
    let children = listing_children(v).ok_or_else(|| ClientError::Parse("listing without data.children".into()))?;
    let mut page = Page::default();
    for child in children {
        let is_t3 = child.get("kind").and_then(|k| k.as_str()) == Some("t3");
        match child.get("data").filter(|_| is_t3).and_then(submission_from_data) {
            Some(s) => page.submissions.push(s),
            None => page.malformed += 1,
        }
    }
    page.after = v
        .get("data")
        .and_then(|d| d.get("after"))
        .and_then(|a| a.as_str())
        .map(|s| s.to_string());
    Ok(page)
}

fn more_from_data(d: &Value) -> Option<MoreStub> {
    Some(MoreStub {
        id: str_field(d, "id")?,
        parent_id: str_field(d, "parent_id")?,
        count: d.get("count").and_then(|x| x.as_u64()).unwrap_or(0),
        children: d
            .get("children")
            .and_then(|c| c.as_array())
            .map(|ids| ids.iter().filter_map(|x| x.as_str().map(|s| s.to_string())).collect())
            .unwrap_or_default(),
    })
}

fn comment_shell(d: &Value) -> Option<RawComment> {
    let hidden = d.get("score_hidden").and_then(|x| x.as_bool()).unwrap_or(false);
    Some(RawComment {
        id: str_field(d, "id")?,
        parent_id: str_field(d, "parent_id")?,
        author: author_field(d),
        body: str_field(d, "body").unwrap_or_default(),
        score: if hidden { None } else { i64_field(d, "score") },
        created_utc: i64_field(d, "created_utc").unwrap_or(0),
        replies: Vec::new(),
    })
}

fn node_from_thing(thing: &Value) -> Option<ForestNode> {
    let d = thing.get("data")?;
    match thing.get("kind").and_then(|k| k.as_str())? {
        "t1" => comment_shell(d).map(ForestNode::Comment),
        "more" => more_from_data(d).map(ForestNode::More),
        _ => None,
    }
}

/// Decode a comment listing (the second element of `/comments/<id>`) into a
/// forest, following nested `replies` listings.
///
/// Walks with an explicit stack; the nesting depth of the input does not
/// reach the call stack.
pub fn parse_comment_listing(v: &Value) -> Vec<ForestNode> {
    // Frames are (json children, index of the decoded node they belong to).
    // Decoded nodes live in `arena` and are linked up after the walk.
    let mut arena: Vec<ForestNode> = Vec::new();
    let mut kids: Vec<Vec<usize>> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut stack: Vec<(&Value, Option<usize>)> = Vec::new();

    if let Some(children) = listing_children(v) {
        for c in children.iter().rev() {
            stack.push((c, None));
        }
    }
    while let Some((thing, parent)) = stack.pop() {
        let Some(node) = node_from_thing(thing) else { continue };
        let idx = arena.len();
        arena.push(node);
        kids.push(Vec::new());
        match parent {
            Some(p) => kids[p].push(idx),
            None => roots.push(idx),
        }
        let replies = thing.get("data").and_then(|d| d.get("replies"));
        if let Some(children) = replies.and_then(listing_children) {
            for c in children.iter().rev() {
                stack.push((c, Some(idx)));
            }
        }
    }
    assemble(arena, kids, roots)
}

/// Decode `/api/morechildren` output. The response is a flat, pre-ordered list;
/// it is re-nested by `parent_id`, and nodes whose parent is not in the batch
/// become roots (children of the stub's parent).
pub fn parse_more_children(v: &Value) -> ClientResult<Vec<ForestNode>> {
    let things = v
        .get("json")
        .and_then(|j| j.get("data"))
        .and_then(|d| d.get("things"))
        .and_then(|t| t.as_array())
        .ok_or_else(|| ClientError::Parse("morechildren without json.data.things".into()))?;
    let nodes: Vec<ForestNode> = things.iter().filter_map(node_from_thing).collect();
    Ok(nest_flat(nodes))
}

/// Re-nest a flat list of nodes by their `parent_id`.
/// A node listed before its parent is treated as a root.
pub fn nest_flat(nodes: Vec<ForestNode>) -> Vec<ForestNode> {
    let mut index_of: AHashMap<String, usize> = AHashMap::with_capacity(nodes.len());
    for (i, n) in nodes.iter().enumerate() {
        if let ForestNode::Comment(c) = n {
            index_of.entry(c.id.clone()).or_insert(i);
        }
    }
    let mut kids: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut roots = Vec::new();
    for (i, n) in nodes.iter().enumerate() {
        let parent = match n {
            ForestNode::Comment(c) => &c.parent_id,
            ForestNode::More(m) => &m.parent_id,
        };
        let (_, bare) = split_fullname(parent);
        match index_of.get(bare) {
            Some(&p) if p < i => kids[p].push(i),
            _ => roots.push(i),
        }
    }
    assemble(nodes, kids, roots)
}

/// Move arena nodes into their parents' `replies`. Children always come after
/// their parent in the arena, so filling from the back never revisits a node.
fn assemble(arena: Vec<ForestNode>, kids: Vec<Vec<usize>>, roots: Vec<usize>) -> Vec<ForestNode> {
    let mut slots: Vec<Option<ForestNode>> = arena.into_iter().map(Some).collect();
    for i in (0..slots.len()).rev() {
        if kids[i].is_empty() {
            continue;
        }
        let mut replies = Vec::with_capacity(kids[i].len());
        for &k in &kids[i] {
            if k > i {
                if let Some(n) = slots[k].take() {
                    replies.push(n);
                }
            }
        }
        if let Some(ForestNode::Comment(c)) = slots[i].as_mut() {
            c.replies = replies;
        }
    }
    roots.into_iter().filter_map(|r| slots[r].take()).collect()
}

/// `/comments/<id>` returns `[submission listing, comment listing]`.
pub fn parse_thread(v: &Value) -> ClientResult<(Submission, Vec<ForestNode>)> {
    let parts = v.as_array().ok_or_else(|| ClientError::Parse("thread response is not an array".into()))?;
    let post = parts
        .first()
        .and_then(listing_children)
        .and_then(|c| c.first())
        .and_then(|t| t.get("data"))
        .and_then(submission_from_data)
        .ok_or_else(|| ClientError::Parse("thread response without a submission".into()))?;
    let forest = parts.get(1).map(parse_comment_listing).unwrap_or_default();
    Ok((post, forest))
}

/// Bare id of a fullname or id string.
pub fn bare_id(s: &str) -> &str {
    split_fullname(s).1
}
