mod common;

use common::*;
use relcases::{CaseEntry, CaseStatus, Manifest};
use std::fs::{self, OpenOptions};
use std::io::Write;

/// Garbage lines and entries whose id does not match the original are skipped and counted.
#[test]
fn malformed_lines_are_skipped() {
    let (_tmp, layout) = data_dir();
    let mut m = Manifest::default();
    m.merge(CaseEntry::new(post("o1", "alice", "First", 100), 7));
    m.save(&layout.manifest()).unwrap();

    let mut mismatched = CaseEntry::new(post("o2", "bob", "Second", 200), 7);
    mismatched.case_id = "zzz".into();
    let mut f = OpenOptions::new().append(true).open(layout.manifest()).unwrap();
    writeln!(f, "{{not json").unwrap();
    writeln!(f, "{}", serde_json::to_string(&mismatched).unwrap()).unwrap();
    writeln!(f).unwrap();
    drop(f);

    let loaded = Manifest::load(&layout.manifest()).unwrap();
    assert_eq!(loaded.ids(), vec!["o1".to_string()]);
    assert_eq!(loaded.skipped_on_load, 2);
}

/// A missing manifest loads as empty.
#[test]
fn missing_manifest_is_empty() {
    let (_tmp, layout) = data_dir();
    let m = Manifest::load(&layout.manifest()).unwrap();
    assert!(m.is_empty());
    assert_eq!(m.skipped_on_load, 0);
}

/// Merging keeps sample time, adds new updates in posting order and reopens a processed case.
#[test]
fn merge_reopens_case_and_orders_updates() {
    let mut m = Manifest::default();
    let mut first = CaseEntry::new(post("o1", "alice", "Story", 100), 1);
    first.add_update(post("u2", "alice", "Update 2", 300));
    m.merge(first);
    m.set_status("o1", CaseStatus::Processed);

    let mut again = CaseEntry::new(with_score(post("o1", "alice", "Story", 100), 250), 99);
    again.add_update(post("u1", "alice", "Update 1", 200));
    again.add_update(post("u2", "alice", "Update 2", 300));
    let out = m.merge(again);

    assert_eq!((out.added, out.updated), (0, 1));
    let case = m.get("o1").unwrap();
    assert_eq!(case.status, CaseStatus::Pending);
    assert_eq!(case.sampled_at, 1);
    assert_eq!(case.original.score, 250);
    assert_eq!(case.updates.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(), vec!["u1", "u2"]);
}

/// A re-merge that brings nothing new leaves a processed case alone.
#[test]
fn merge_without_new_updates_keeps_status() {
    let mut m = Manifest::default();
    let mut first = CaseEntry::new(post("o1", "alice", "Story", 100), 1);
    first.add_update(post("u1", "alice", "Update", 200));
    m.merge(first.clone());
    m.set_status("o1", CaseStatus::Processed);

    let out = m.merge(first);
    assert_eq!(out.updated, 0);
    assert_eq!(m.get("o1").unwrap().status, CaseStatus::Processed);
}

/// New updates do not revive an unavailable case.
#[test]
fn new_update_keeps_unavailable_case_unavailable() {
    let mut m = Manifest::default();
    m.merge(CaseEntry::new(deleted_post("o1", "[deleted]", 100), 1));
    let mut again = CaseEntry::new(deleted_post("o1", "[deleted]", 100), 2);
    again.add_update(post("u1", "alice", "Update", 200));
    m.merge(again);
    assert_eq!(m.get("o1").unwrap().status, CaseStatus::Unavailable);
    assert_eq!(m.get("o1").unwrap().updates.len(), 1);
}

/// An original found deleted on a later run flips the case to unavailable.
#[test]
fn merge_marks_unavailable() {
    let mut m = Manifest::default();
    m.merge(CaseEntry::new(post("o1", "alice", "Story", 100), 1));
    let out = m.merge(CaseEntry::new(deleted_post("o1", "[deleted]", 100), 2));
    assert_eq!(out.updated, 1);
    assert_eq!(m.get("o1").unwrap().status, CaseStatus::Unavailable);
}

/// Saved manifests are ordered by case id and leave no temp files behind.
#[test]
fn save_is_sorted_and_atomic() {
    let (_tmp, layout) = data_dir();
    let mut m = Manifest::default();
    for id in ["c3", "a1", "b2"] {
        m.merge(CaseEntry::new(post(id, "x", "t", 1), 0));
    }
    m.save(&layout.manifest()).unwrap();

    let lines = read_lines(&layout.manifest());
    let ids: Vec<String> = lines
        .iter()
        .map(|l| serde_json::from_str::<CaseEntry>(l).unwrap().case_id)
        .collect();
    assert_eq!(ids, vec!["a1", "b2", "c3"]);
    assert!(leftover_tmp_files(layout.root()).is_empty());
    assert!(fs::metadata(layout.manifest()).unwrap().len() > 0);
}

fn with_score(mut s: relcases::Submission, score: i64) -> relcases::Submission {
    s.score = score;
    s
}
