use relcases::client::{ListingSort, TopWindow};
use relcases::{ClientOptions, Credentials, FileConfig, YearMonth};

/// Every section of the config file is optional and falls back to defaults.
#[test]
fn empty_config_is_defaults() {
    let cfg = FileConfig::parse("").unwrap();
    assert_eq!(cfg.sampler.community, "relationships");
    assert_eq!(cfg.sampler.sort, ListingSort::New);
    assert_eq!(cfg.sampler.max_cases, 25);
    assert!(cfg.sampler.require_update);
    assert_eq!(cfg.processor.workers, 1);
    assert_eq!(cfg.processor.limits.max_depth, 64);
    assert_eq!(cfg.report.top_comments, 5);
    assert!(cfg.report.anonymise);
    assert_eq!(cfg.reddit.min_interval_ms, ClientOptions::default().min_interval_ms);
}

/// Stage sections and credentials parse from TOML.
#[test]
fn parses_sections() {
    let raw = r#"
        [reddit]
        client_id = "id-123"
        client_secret = "s3cret"
        user_agent = "relcases-test/0.1"
        max_retries = 2

        [sampler]
        community = "relationship_advice"
        sort = "top:week"
        since = "2024-03"
        max_cases = 10

        [processor]
        max_depth = 8
        expand_budget = 3
        workers = 4

        [report]
        anonymise = false
    "#;
    let cfg = FileConfig::parse(raw).unwrap();
    assert_eq!(cfg.reddit.credentials.client_id, "id-123");
    assert_eq!(cfg.reddit.max_retries, 2);
    assert_eq!(cfg.sampler.sort, ListingSort::Top(TopWindow::Week));
    assert_eq!(cfg.sampler.since, Some(YearMonth::new(2024, 3)));
    assert_eq!(cfg.sampler.max_cases, 10);
    assert_eq!(cfg.processor.limits.max_depth, 8);
    assert_eq!(cfg.processor.limits.expand_budget, 3);
    assert_eq!(cfg.processor.workers, 4);
    assert!(!cfg.report.anonymise);
}

/// Bad values are rejected rather than silently defaulted.
#[test]
fn rejects_bad_values() {
    assert!(FileConfig::parse("[sampler]\nsort = \"rising\"\n").is_err());
    assert!(FileConfig::parse("[sampler]\nsince = \"2024-13\"\n").is_err());
}

/// Debug output never shows the client id or secret.
#[test]
fn credentials_are_redacted() {
    let creds = Credentials {
        client_id: "id-123".into(),
        client_secret: "s3cret".into(),
        user_agent: "relcases-test/0.1".into(),
    };
    let shown = format!("{:?}", ClientOptions::default().with_credentials(creds));
    assert!(!shown.contains("s3cret"));
    assert!(!shown.contains("id-123"));
    assert!(shown.contains("relcases-test/0.1"));
}

/// Listing sorts parse from their command-line spelling and print back the same way.
#[test]
fn listing_sort_strings() {
    assert_eq!("new".parse::<ListingSort>().unwrap(), ListingSort::New);
    assert_eq!("top".parse::<ListingSort>().unwrap(), ListingSort::Top(TopWindow::Month));
    assert_eq!("TOP:all".parse::<ListingSort>().unwrap().to_string(), "top:all");
    assert!("top:decade".parse::<ListingSort>().is_err());
}
