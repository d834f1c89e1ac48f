mod common;

use common::*;
use relcases::{run_sampler, CaseStatus, Manifest, Outcome, SamplerOptions, YearMonth};
use std::fs;

fn opts() -> SamplerOptions {
    SamplerOptions::default().with_progress(false)
}

fn birthday_story() -> FixtureSource {
    let sticky = relcases::Submission { stickied: true, ..post("mod1", "mods", "Weekly rules reminder", 2500) };
    FixtureSource::new()
        .list(sticky)
        .list(post("u1", "alice", "UPDATE: My (28F) boyfriend forgot my birthday", 2000))
        .list(post("o2", "bob", "Should I move cities for work?", 1500))
        .list(post("o1", "alice", "My (28F) boyfriend forgot my birthday", 1000))
}

/// An update is linked to the same author's earlier post with the matching title.
#[test]
fn links_update_to_original_by_title() {
    let (_tmp, layout) = data_dir();
    let src = birthday_story();
    let report = run_sampler(&src, &layout, &opts()).unwrap();

    let m = Manifest::load(&layout.manifest()).unwrap();
    assert_eq!(m.len(), 1, "originals without updates are not sampled by default");
    let case = m.get("o1").unwrap();
    assert_eq!(case.status, CaseStatus::Pending);
    assert_eq!(case.updates.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(), vec!["u1"]);
    assert_eq!(report.added, 1);
    assert_eq!(report.summary.count(Outcome::Ignored), 1, "the stickied post is ignored");
    assert!(layout.run_summary("sample").is_file());
}

/// Running the sampler twice against the same source leaves the manifest byte-identical.
#[test]
fn rerun_is_idempotent() {
    let (_tmp, layout) = data_dir();
    let src = birthday_story();
    run_sampler(&src, &layout, &opts()).unwrap();
    let first = fs::read(layout.manifest()).unwrap();

    let again = run_sampler(&src, &layout, &opts()).unwrap();
    let second = fs::read(layout.manifest()).unwrap();
    assert_eq!(first, second);
    assert_eq!(again.added, 0);
    assert_eq!(again.updated, 0);
}

/// A permalink in the update body wins over any title match.
#[test]
fn permalink_in_body_takes_precedence() {
    let (_tmp, layout) = data_dir();
    let mut update = post("u9", "carol", "Update: roommate situation", 3000);
    update.selftext = "Original here: https://www.reddit.com/r/relationships/comments/orig9/help_me/ thanks all".into();
    let src = FixtureSource::new()
        .list(update)
        .list(post("t1x", "carol", "Roommate situation", 2000))
        .hidden(post("orig9", "carol", "My (30F) roommate keeps borrowing my car", 1000));

    run_sampler(&src, &layout, &opts()).unwrap();
    let m = Manifest::load(&layout.manifest()).unwrap();
    assert_eq!(m.ids(), vec!["orig9".to_string()]);
    assert_eq!(m.get("orig9").unwrap().updates[0].id, "u9");
}

/// A linked original that is deleted or gone yields a case marked unavailable.
#[test]
fn deleted_original_is_unavailable() {
    let (_tmp, layout) = data_dir();
    let mut u_deleted = post("ua", "dave", "Update: the wedding", 3000);
    u_deleted.selftext = "see redd.it/dela1 for context".into();
    let mut u_missing = post("ub", "erin", "Update: the move", 3100);
    u_missing.selftext = "old post: /r/relationships/comments/miss1/the_move/".into();
    let src = FixtureSource::new()
        .list(u_missing)
        .list(u_deleted)
        .hidden(deleted_post("dela1", "[deleted]", 1000));

    let report = run_sampler(&src, &layout, &opts()).unwrap();
    let m = Manifest::load(&layout.manifest()).unwrap();
    assert_eq!(m.len(), 2);
    assert_eq!(m.get("dela1").unwrap().status, CaseStatus::Unavailable);
    assert_eq!(m.get("miss1").unwrap().status, CaseStatus::Unavailable);
    assert_eq!(report.summary.count(Outcome::Unavailable), 2);
}

/// Originals missing from the listing are found through community search, unless disabled.
#[test]
fn search_fallback_finds_original() {
    let (_tmp, layout) = data_dir();
    let src = FixtureSource::new()
        .list(post("u5", "frank", "[UPDATE] My sister borrowed money and vanished", 5000))
        .search_hit(post("s5", "someone_else", "My sister borrowed money and vanished", 900))
        .search_hit(post("o5", "frank", "My sister borrowed money and vanished", 1000));

    let off = run_sampler(&src, &layout, &opts().with_search_fallback(false)).unwrap();
    assert_eq!(off.cases_sampled, 0);
    assert_eq!(off.summary.count(Outcome::Unlinked), 1);

    run_sampler(&src, &layout, &opts()).unwrap();
    let m = Manifest::load(&layout.manifest()).unwrap();
    assert_eq!(m.ids(), vec!["o5".to_string()], "only the same author's post qualifies");
}

/// Paging continues past the first page until enough updates are found.
#[test]
fn pages_through_listing() {
    let (_tmp, layout) = data_dir();
    let mut src = FixtureSource::new();
    for i in 0..130 {
        src = src.list(post(&format!("p{i:03}"), &format!("user{i}"), &format!("Question number {i}"), 10_000 - i));
    }
    src = src
        .list(post("late1", "gina", "Update - my in-laws and the holidays", 5000))
        .list(post("orig1", "gina", "My in-laws and the holidays", 4000));

    let report = run_sampler(&src, &layout, &opts().with_sample_size(1, 1)).unwrap();
    assert_eq!(report.cases_sampled, 1);
    assert!(src.calls_matching("list:") >= 2);
}

/// With a newest-first listing, paging stops at the first post older than `since`.
#[test]
fn since_cutoff_stops_listing() {
    let (_tmp, layout) = data_dir();
    let march = YearMonth::new(2024, 3).start_epoch();
    let src = FixtureSource::new()
        .list(post("u7", "hank", "Update: the job offer", march + 86_400 * 20))
        .list(post("o7", "hank", "The job offer", march - 86_400 * 10));

    let report = run_sampler(
        &src,
        &layout,
        &opts().with_since(Some(YearMonth::new(2024, 3))).with_search_fallback(false),
    )
    .unwrap();
    assert_eq!(report.cases_sampled, 0);
    assert_eq!(report.summary.count(Outcome::Unlinked), 1);
}

/// `require_update = false` keeps standalone originals as cases.
#[test]
fn standalone_originals_when_updates_not_required() {
    let (_tmp, layout) = data_dir();
    let src = birthday_story();
    run_sampler(&src, &layout, &opts().with_require_update(false)).unwrap();
    let m = Manifest::load(&layout.manifest()).unwrap();
    assert_eq!(m.ids(), vec!["o1".to_string(), "o2".to_string()]);
}

/// A permalink to someone else's post, or to a link post, does not make it the original.
#[test]
fn permalink_to_foreign_or_link_post_is_not_followed() {
    let (_tmp, layout) = data_dir();
    let mut update = post("u9", "carol", "Update: roommate situation", 3000);
    update.selftext = "Inspired by /r/AskReddit/comments/othr1/x/ and my own redd.it/lnk01".into();
    let link_post = relcases::Submission { is_self: false, ..post("lnk01", "carol", "Roommate situation", 1500) };
    let src = FixtureSource::new()
        .list(update)
        .list(post("t1x", "carol", "Roommate situation", 2000))
        .hidden(post("othr1", "dave", "What is your worst roommate story?", 1000))
        .hidden(link_post);

    run_sampler(&src, &layout, &opts()).unwrap();
    let m = Manifest::load(&layout.manifest()).unwrap();
    assert_eq!(m.ids(), vec!["t1x".to_string()]);
    assert_eq!(src.calls_matching("get:"), 2);
}
