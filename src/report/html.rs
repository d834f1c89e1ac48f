//! HTML for case pages and the index. Every piece of upstream text goes
//! through `html_escape`.

use super::anonymise::Anonymiser;
use super::threads::{CommentTree, Thread};
use crate::date::{format_utc, ym_from_epoch, YearMonth};
use crate::manifest::{CaseEntry, CaseStatus};
use crate::metrics::{MetricRecord, SubmissionMetrics};
use crate::model::{CommentRow, Submission, SubmissionRole};

/// One line of the index page.
#[derive(Clone, Debug)]
pub struct IndexEntry {
    pub case_id: String,
    pub title: String,
    pub created_utc: i64,
    pub status: CaseStatus,
    pub page: String,
    pub updates: usize,
    pub comments: Option<u64>,
    pub average_score: Option<f64>,
    pub placeholder: bool,
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn build_page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body{{font-family:-apple-system,Segoe UI,Helvetica,Arial,sans-serif;max-width:960px;margin:0 auto;padding:16px;color:#222;}}
pre{{white-space:pre-wrap;font-family:inherit;}}
table{{border-collapse:collapse;margin:8px 0;}}
td,th{{border:1px solid #ddd;padding:4px 8px;text-align:left;font-size:13px;}}
.post{{border-left:4px solid #1565c0;padding-left:12px;margin:16px 0;}}
.meta{{color:#666;font-size:12px;}}
.comment{{border:1px solid #e0e0e0;border-radius:6px;padding:8px;margin:10px 0;}}
.reply{{border-left:2px solid #cfd8dc;padding-left:10px;margin:6px 0 6px 12px;}}
.author{{font-weight:600;margin:0;}}
.incomplete{{color:#b26a00;font-size:12px;}}
.placeholder{{color:#888;font-style:italic;}}
</style>
</head>
<body>
{content}
</body>
</html>
"#,
        title = html_escape(title),
    )
}

fn fmt_opt_f64(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "n/a".to_string())
}

fn fmt_score(v: Option<i64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "hidden".to_string())
}

fn display_title(case: &CaseEntry) -> String {
    let t = case.original.title.trim();
    if t.is_empty() || (case.original.is_unavailable() && t == "[deleted]") {
        format!("Case {}", case.case_id)
    } else {
        t.to_string()
    }
}

fn render_post(post: &Submission, role: SubmissionRole, stats: Option<&SubmissionMetrics>, anon: &mut Anonymiser) -> String {
    let heading = match role {
        SubmissionRole::Original => "Original post",
        SubmissionRole::Update => "Update",
    };
    let ratio = stats.map(|s| format!("{:.3}", s.op_response_ratio)).unwrap_or_else(|| "n/a".to_string());
    let upvote = post.upvote_ratio.map(|r| format!("{r:.2}")).unwrap_or_else(|| "n/a".to_string());
    format!(
        r#"<div class="post">
<h2>{heading}: {title}</h2>
<p class="meta">by {author} | posted {posted} | score {score} | upvote ratio {upvote} | {comments} comments | author response ratio {ratio}</p>
<pre>{body}</pre>
</div>
"#,
        title = html_escape(&post.title),
        author = html_escape(&anon.name(post.author.as_deref())),
        posted = format_utc(post.created_utc),
        score = post.score,
        comments = post.num_comments,
        body = html_escape(&post.selftext),
    )
}

fn render_comment_head(row: &CommentRow, anon: &mut Anonymiser, stats: Option<&Thread>) -> String {
    let mut s = format!(
        "<p class=\"author\">{}</p>\n<p class=\"meta\">{} | score {}",
        html_escape(&anon.name(row.author.as_deref())),
        format_utc(row.created_utc),
        fmt_score(row.score),
    );
    if let Some(t) = stats {
        s.push_str(&format!(" | replies {} | author response ratio {:.3}", t.replies, t.op_response_ratio));
    }
    s.push_str("</p>\n");
    s.push_str(&format!("<pre>{}</pre>\n", html_escape(&row.body)));
    if row.replies_incomplete {
        s.push_str("<p class=\"incomplete\">Some replies could not be loaded.</p>\n");
    }
    s
}

enum Step {
    Open(usize),
    Close,
}

/// A thread with its full reply chain, as nested blocks.
fn render_thread(tree: &CommentTree<'_>, thread: &Thread, anon: &mut Anonymiser) -> String {
    let mut out = String::new();
    let mut stack = vec![Step::Open(thread.root)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Close => out.push_str("</div>\n"),
            Step::Open(i) => {
                let is_root = i == thread.root;
                out.push_str(if is_root { "<div class=\"comment\">\n" } else { "<div class=\"reply\">\n" });
                out.push_str(&render_comment_head(tree.row(i), anon, is_root.then_some(thread)));
                stack.push(Step::Close);
                for &c in tree.children(i).iter().rev() {
                    stack.push(Step::Open(c));
                }
            }
        }
    }
    out
}

fn render_comment_sections(
    rows: &[CommentRow],
    post: &Submission,
    top_comments: usize,
    anon: &mut Anonymiser,
) -> String {
    let tree = CommentTree::build(rows, &post.id);
    let op = post.author.as_deref();
    let mut out = String::new();

    out.push_str("<h3>Most engaged threads</h3>\n");
    let engaged = tree.most_engaged(op);
    if engaged.is_empty() {
        out.push_str("<p class=\"placeholder\">The author did not reply to any thread.</p>\n");
    }
    for t in &engaged {
        out.push_str(&render_thread(&tree, t, anon));
    }

    out.push_str("<h3>Highest scored comments</h3>\n");
    let top = tree.top_scored(op, top_comments);
    if top.is_empty() {
        out.push_str("<p class=\"placeholder\">No comments.</p>\n");
    }
    for t in &top {
        out.push_str(&render_thread(&tree, t, anon));
    }
    out
}

fn render_metrics(m: &MetricRecord) -> String {
    let mut s = String::from("<h2>Metrics</h2>\n<table>\n");
    let rows: [(&str, String); 8] = [
        ("Comments", m.total_comments.to_string()),
        ("Replies", m.total_replies.to_string()),
        ("Max depth", m.max_depth.to_string()),
        ("Average score", fmt_opt_f64(m.average_score)),
        ("Scored comments", m.scored_comments.to_string()),
        ("Deleted or removed", m.deleted_comments.to_string()),
        ("Hidden scores", m.hidden_scores.to_string()),
        ("Incomplete subtrees", m.incomplete_subtrees.to_string()),
    ];
    for (k, v) in rows {
        s.push_str(&format!("<tr><th>{k}</th><td>{v}</td></tr>\n"));
    }
    s.push_str("</table>\n");

    s.push_str("<table>\n<tr><th>Depth</th><th>Comments</th><th>Scored</th><th>Mean score</th></tr>\n");
    for (depth, b) in &m.score_by_depth {
        s.push_str(&format!(
            "<tr><td>{depth}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            b.count,
            b.scored,
            fmt_opt_f64(b.mean)
        ));
    }
    s.push_str("</table>\n");

    s.push_str("<table>\n<tr><th>Submission</th><th>Role</th><th>Comments</th><th>By author</th><th>Response ratio</th></tr>\n");
    for sm in &m.submissions {
        let role = match sm.role {
            SubmissionRole::Original => "original",
            SubmissionRole::Update => "update",
        };
        s.push_str(&format!(
            "<tr><td>{}</td><td>{role}</td><td>{}</td><td>{}</td><td>{:.3}</td></tr>\n",
            html_escape(&sm.submission_id),
            sm.comments,
            sm.op_comments,
            sm.op_response_ratio
        ));
    }
    s.push_str("</table>\n");
    s
}

/// Full page of a processed case.
pub fn render_case_page(
    case: &CaseEntry,
    rows: &[CommentRow],
    metrics: &MetricRecord,
    top_comments: usize,
    anonymise: bool,
) -> String {
    let mut anon = Anonymiser::new(&case.case_id, case.original.author.as_deref(), anonymise);
    let stats_for = |id: &str| metrics.submissions.iter().find(|s| s.submission_id == id);
    let title = display_title(case);

    let mut content = format!(
        "<p><a href=\"index.html\">All cases</a></p>\n<h1>{}</h1>\n<p class=\"meta\">case {} | {} update(s)</p>\n",
        html_escape(&title),
        html_escape(&case.case_id),
        case.updates.len()
    );
    content.push_str(&render_metrics(metrics));

    content.push_str(&render_post(&case.original, SubmissionRole::Original, stats_for(&case.original.id), &mut anon));
    content.push_str(&render_comment_sections(rows, &case.original, top_comments, &mut anon));
    for u in &case.updates {
        content.push_str(&render_post(u, SubmissionRole::Update, stats_for(&u.id), &mut anon));
        content.push_str(&render_comment_sections(rows, u, top_comments, &mut anon));
    }
    build_page(&title, &content)
}

/// Stand-in page for a case with nothing to show.
pub fn render_placeholder(case: &CaseEntry, reason: &str) -> String {
    let content = format!(
        "<p><a href=\"index.html\">All cases</a></p>\n<h1>Case {id}</h1>\n<p class=\"placeholder\">{reason}</p>\n",
        id = html_escape(&case.case_id),
        reason = html_escape(reason),
    );
    build_page(&format!("Case {}", case.case_id), &content)
}

/// Index of all cases, newest first, grouped by posting month.
pub fn render_index(entries: &[IndexEntry]) -> String {
    let mut content = format!("<h1>Relationship cases</h1>\n<p class=\"meta\">{} case(s)</p>\n", entries.len());
    let mut current: Option<YearMonth> = None;
    for e in entries {
        let ym = ym_from_epoch(e.created_utc);
        if current != Some(ym) {
            if current.is_some() {
                content.push_str("</table>\n");
            }
            content.push_str(&format!(
                "<h2>{}</h2>\n<table>\n<tr><th>Case</th><th>Posted</th><th>Status</th><th>Updates</th><th>Comments</th><th>Average score</th></tr>\n",
                ym.label()
            ));
            current = Some(ym);
        }
        let class = if e.placeholder { "case-row placeholder" } else { "case-row" };
        content.push_str(&format!(
            "<tr class=\"{class}\"><td><a href=\"{page}\">{title}</a></td><td>{posted}</td><td>{status}</td><td>{updates}</td><td>{comments}</td><td>{avg}</td></tr>\n",
            page = html_escape(&e.page),
            title = html_escape(&e.title),
            posted = format_utc(e.created_utc),
            status = e.status.as_str(),
            updates = e.updates,
            comments = e.comments.map(|c| c.to_string()).unwrap_or_else(|| "n/a".to_string()),
            avg = fmt_opt_f64(e.average_score),
        ));
    }
    if current.is_some() {
        content.push_str("</table>\n");
    }
    build_page("Relationship cases", &content)
}

pub fn index_entry(case: &CaseEntry, page: String, metrics: Option<&MetricRecord>) -> IndexEntry {
    IndexEntry {
        case_id: case.case_id.clone(),
        title: display_title(case),
        created_utc: case.created_utc,
        status: case.status,
        page,
        updates: case.updates.len(),
        comments: metrics.map(|m| m.total_comments),
        average_score: metrics.and_then(|m| m.average_score),
        placeholder: metrics.is_none(),
    }
}
