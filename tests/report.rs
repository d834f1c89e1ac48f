mod common;

use common::*;
use relcases::{
    report_index, report_page, run_processor, run_report, CaseEntry, CaseStatus, DataLayout, Manifest, Outcome,
    ProcessOptions, ReportOptions, YearMonth,
};
use std::fs;
use std::path::Path;

const DAY: i64 = 86_400;

fn may(day: i64) -> i64 {
    YearMonth::new(2024, 5).start_epoch() + DAY * (day - 1)
}

fn april(day: i64) -> i64 {
    YearMonth::new(2024, 4).start_epoch() + DAY * (day - 1)
}

/// One processed case (o1), one with a deleted original (o2), one not processed yet (o3).
fn build_data(layout: &DataLayout, title: &str) {
    let original = post("o1", "alice", title, may(10));
    let mut case = CaseEntry::new(original.clone(), 0);
    let update = post("u1", "alice", "Update: things got better", may(15));
    case.add_update(update.clone());

    let mut m = Manifest::default();
    m.merge(case);
    m.merge(CaseEntry::new(deleted_post("o2", "[deleted]", april(2)), 0));
    m.merge(CaseEntry::new(post("o3", "dave", "Newest story", may(20)), 0));
    m.save(&layout.manifest()).unwrap();

    let src = FixtureSource::new()
        .hidden(original)
        .hidden(update)
        .forest(
            "o1",
            vec![
                comment("c1", "t3_o1", "bob", 12, vec![comment("r1", "t1_c1", "alice", 3, vec![])]),
                comment("c2", "t3_o1", "carol", 40, vec![comment("r2", "t1_c2", "bob", 1, vec![])]),
            ],
        )
        .forest("u1", vec![comment("c3", "t3_u1", "carol", 8, vec![])]);
    let opts = ProcessOptions::default().with_progress(false).with_only(["o1"]);
    run_processor(&src, layout, &opts).unwrap();
    assert_eq!(Manifest::load(&layout.manifest()).unwrap().get("o1").unwrap().status, CaseStatus::Processed);
}

fn render(layout: &DataLayout, out: &Path, opts: ReportOptions) -> relcases::ReportRun {
    run_report(layout, out, &opts.with_progress(false)).unwrap()
}

/// The index lists every manifest case, with placeholders for those without outputs.
#[test]
fn index_has_one_row_per_manifest_case() {
    let (tmp, layout) = data_dir();
    build_data(&layout, "My (25F) partner and the lease");
    let out = tmp.path().join("reports");
    let run = render(&layout, &out, ReportOptions::default());

    assert_eq!(run.pages, 3);
    assert_eq!(run.placeholders, 2);
    let index = fs::read_to_string(report_index(&out)).unwrap();
    assert_eq!(index.matches("class=\"case-row").count(), 3);
    assert_eq!(index.matches("case-row placeholder").count(), 2);
    for id in ["o1", "o2", "o3"] {
        assert!(report_page(&out, id).is_file(), "page for {id}");
    }
    let gone = fs::read_to_string(report_page(&out, "o2")).unwrap();
    assert!(gone.contains("unavailable"));
    assert!(layout.run_summary("report").is_file());
}

/// Cases are newest first under month headings.
#[test]
fn index_is_sorted_and_grouped_by_month() {
    let (tmp, layout) = data_dir();
    build_data(&layout, "My (25F) partner and the lease");
    let out = tmp.path().join("reports");
    render(&layout, &out, ReportOptions::default());

    let index = fs::read_to_string(report_index(&out)).unwrap();
    let pos = |needle: &str| index.find(needle).unwrap_or_else(|| panic!("missing {needle}"));
    assert!(pos("o3.html") < pos("o1.html"));
    assert!(pos("o1.html") < pos("o2.html"));
    assert!(pos("<h2>2024-05</h2>") < pos("<h2>2024-04</h2>"));
    assert!(pos("<h2>2024-04</h2>") < pos("o2.html"));
}

/// Usernames are replaced by stable pseudonyms unless anonymisation is off.
#[test]
fn pages_are_anonymised_by_default() {
    let (tmp, layout) = data_dir();
    build_data(&layout, "My (25F) partner and the lease");
    let out = tmp.path().join("reports");
    render(&layout, &out, ReportOptions::default());

    let page = fs::read_to_string(report_page(&out, "o1")).unwrap();
    for name in ["alice", "bob", "carol"] {
        assert!(!page.contains(name), "{name} leaked");
    }
    assert!(page.contains("author_o1"));
    assert!(page.contains("commenter_1"));
    assert!(page.contains("commenter_2"));

    let plain = tmp.path().join("plain");
    render(&layout, &plain, ReportOptions::default().with_anonymise(false));
    let page = fs::read_to_string(report_page(&plain, "o1")).unwrap();
    assert!(page.contains("bob"));
    assert!(page.contains("alice"));
}

/// Threads the author replied in are listed as most engaged; the rest compete on score.
#[test]
fn engaged_and_top_sections() {
    let (tmp, layout) = data_dir();
    build_data(&layout, "My (25F) partner and the lease");
    let out = tmp.path().join("reports");
    render(&layout, &out, ReportOptions::default().with_anonymise(false));

    let page = fs::read_to_string(report_page(&out, "o1")).unwrap();
    let engaged = page.find("Most engaged threads").unwrap();
    let top = page.find("Highest scored comments").unwrap();
    let c1 = page.find("comment c1").unwrap();
    let c2 = page.find("comment c2").unwrap();
    assert!(engaged < c1 && c1 < top, "c1 has a reply from the author");
    assert!(top < c2, "c2 has none");
    assert!(page.contains("author response ratio 1.000"));
    assert!(page.contains("Update: things got better"));
}

/// Upstream text is escaped.
#[test]
fn text_is_html_escaped() {
    let (tmp, layout) = data_dir();
    build_data(&layout, "<script>alert(1)</script> & me");
    let out = tmp.path().join("reports");
    render(&layout, &out, ReportOptions::default());

    let page = fs::read_to_string(report_page(&out, "o1")).unwrap();
    assert!(!page.contains("<script>"));
    assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; me"));
    let index = fs::read_to_string(report_index(&out)).unwrap();
    assert!(!index.contains("<script>"));
}

/// A case whose last run failed is a placeholder, even with outputs from an earlier run on disk.
#[test]
fn failed_rerun_renders_placeholder() {
    let (tmp, layout) = data_dir();
    build_data(&layout, "My (25F) partner and the lease");
    let failing = FixtureSource::new().failing("o1");
    let opts = ProcessOptions::default().with_progress(false).with_only(["o1"]).with_force(true);
    run_processor(&failing, &layout, &opts).unwrap();
    assert_eq!(Manifest::load(&layout.manifest()).unwrap().get("o1").unwrap().status, CaseStatus::Failed);
    assert!(layout.is_processed("o1"), "earlier outputs are still there");

    let out = tmp.path().join("reports");
    let run = render(&layout, &out, ReportOptions::default());
    assert_eq!(run.placeholders, 3);
    assert_eq!(run.summary.count(Outcome::Completed), 0);
    assert_eq!(run.summary.count(Outcome::Placeholder), 2);

    let page = fs::read_to_string(report_page(&out, "o1")).unwrap();
    assert!(!page.contains("Most engaged threads"));
    assert!(page.contains("could not be fetched"));
}
