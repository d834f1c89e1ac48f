use crate::client::ListingSort;
use crate::date::YearMonth;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";

/// API credentials. `Debug` never prints the secret.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub user_agent: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Credentials {
    /// Environment variables win over the file; every field must end up non-empty.
    pub fn resolve(file: &Credentials) -> Result<Self> {
        let pick = |env: &str, from_file: &str| {
            std::env::var(env)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| from_file.trim().to_string())
        };
        let creds = Credentials {
            client_id: pick(ENV_CLIENT_ID, &file.client_id),
            client_secret: pick(ENV_CLIENT_SECRET, &file.client_secret),
            user_agent: pick(ENV_USER_AGENT, &file.user_agent),
        };
        let mut missing = Vec::new();
        if creds.client_id.is_empty() { missing.push(ENV_CLIENT_ID); }
        if creds.client_secret.is_empty() { missing.push(ENV_CLIENT_SECRET); }
        if creds.user_agent.is_empty() { missing.push(ENV_USER_AGENT); }
        if !missing.is_empty() {
            bail!(
                "missing API credentials: set [reddit] client_id/client_secret/user_agent in the config file or {}",
                missing.join(", ")
            );
        }
        Ok(creds)
    }
}

/// Upstream client tuning.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Minimum spacing between two requests.
    pub min_interval_ms: u64,
    pub max_retries: usize,
    /// Linear backoff step: attempt `i` waits `backoff_ms * i`.
    pub backoff_ms: u64,
    pub timeout_secs: u64,
    pub api_base: String,
    pub auth_url: String,
}

impl ClientOptions {
    pub fn with_credentials(mut self, creds: Credentials) -> Self { self.credentials = creds; self }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            // 60 requests/minute is the documented OAuth budget.
            min_interval_ms: 1000,
            max_retries: 4,
            backoff_ms: 2000,
            timeout_secs: 30,
            api_base: "https://oauth.reddit.com".to_string(),
            auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
        }
    }
}

/// Sampler options with defaults matching the community this tool was built for.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SamplerOptions {
    pub community: String,
    #[serde(with = "sort_str")]
    pub sort: ListingSort,
    pub min_cases: usize,
    pub max_cases: usize,
    /// Upper bound on listing entries inspected.
    pub scan_limit: usize,
    /// Stop paging once the listing reaches posts older than this month.
    #[serde(with = "ym_str")]
    pub since: Option<YearMonth>,
    pub update_flair: Option<String>,
    pub original_flair: Option<String>,
    pub require_update: bool,
    /// Fall back to community search when an update's original is not in the listing.
    pub search_fallback: bool,
    pub progress: bool,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            community: "relationships".to_string(),
            sort: ListingSort::New,
            min_cases: 1,
            max_cases: 25,
            scan_limit: 1000,
            since: None,
            update_flair: None,
            original_flair: None,
            require_update: true,
            search_fallback: true,
            progress: true,
        }
    }
}

impl SamplerOptions {
    pub fn with_community(mut self, sub: impl AsRef<str>) -> Self {
        let mut s = sub.as_ref().trim().to_lowercase();
        if let Some(rest) = s.strip_prefix("r/") {
            s = rest.to_string();
        }
        self.community = s;
        self
    }
    pub fn with_sort(mut self, sort: ListingSort) -> Self { self.sort = sort; self }
    pub fn with_sample_size(mut self, min: usize, max: usize) -> Self {
        self.max_cases = max.max(1);
        self.min_cases = min.min(self.max_cases);
        self
    }
    pub fn with_scan_limit(mut self, n: usize) -> Self { self.scan_limit = n.max(1); self }
    pub fn with_since(mut self, ym: Option<YearMonth>) -> Self { self.since = ym; self }
    pub fn with_update_flair(mut self, flair: impl Into<String>) -> Self { self.update_flair = Some(flair.into()); self }
    pub fn with_original_flair(mut self, flair: impl Into<String>) -> Self { self.original_flair = Some(flair.into()); self }
    pub fn with_require_update(mut self, yes: bool) -> Self { self.require_update = yes; self }
    pub fn with_search_fallback(mut self, yes: bool) -> Self { self.search_fallback = yes; self }
    pub fn with_progress(mut self, yes: bool) -> Self { self.progress = yes; self }
}

/// Traversal bounds for one case, across all of its comment forests.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct TraversalLimits {
    /// Deepest depth emitted (top-level is 0).
    pub max_depth: u32,
    /// Maximum rows emitted per case.
    pub node_budget: usize,
    /// Maximum "more replies" placeholders expanded per case.
    pub expand_budget: usize,
}

impl Default for TraversalLimits {
    fn default() -> Self {
        Self { max_depth: 64, node_budget: 50_000, expand_budget: 250 }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProcessOptions {
    pub force: bool,
    #[serde(flatten)]
    pub limits: TraversalLimits,
    /// Reply depth requested from the initial forest fetch.
    pub expand_depth: u32,
    /// Cases processed concurrently; all workers share one rate limiter.
    pub workers: usize,
    pub progress: bool,
    /// Restrict the run to these case ids (empty = all).
    pub only: Vec<String>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            force: false,
            limits: TraversalLimits::default(),
            expand_depth: 10,
            workers: 1,
            progress: true,
            only: Vec::new(),
        }
    }
}

impl ProcessOptions {
    pub fn with_force(mut self, yes: bool) -> Self { self.force = yes; self }
    pub fn with_max_depth(mut self, d: u32) -> Self { self.limits.max_depth = d; self }
    pub fn with_node_budget(mut self, n: usize) -> Self { self.limits.node_budget = n.max(1); self }
    pub fn with_expand_budget(mut self, n: usize) -> Self { self.limits.expand_budget = n; self }
    pub fn with_expand_depth(mut self, d: u32) -> Self { self.expand_depth = d.max(1); self }
    pub fn with_workers(mut self, n: usize) -> Self { self.workers = n.max(1); self }
    pub fn with_progress(mut self, yes: bool) -> Self { self.progress = yes; self }
    pub fn with_only<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = ids.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// Highest-scored top-level comments shown per submission.
    pub top_comments: usize,
    /// Replace author handles with `author_<case_id>` / `commenter_<k>`.
    pub anonymise: bool,
    pub progress: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { top_comments: 5, anonymise: true, progress: true }
    }
}

impl ReportOptions {
    pub fn with_top_comments(mut self, n: usize) -> Self { self.top_comments = n; self }
    pub fn with_anonymise(mut self, yes: bool) -> Self { self.anonymise = yes; self }
    pub fn with_progress(mut self, yes: bool) -> Self { self.progress = yes; self }
}

/// Layout of the optional TOML config file. Every section may be omitted.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub reddit: ClientOptions,
    pub sampler: SamplerOptions,
    pub processor: ProcessOptions,
    pub report: ReportOptions,
}

impl FileConfig {
    /// Load `path` if given. A path that was given but cannot be read is a
    /// setup failure; no path means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else { return Ok(Self::default()) };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

mod sort_str {
    use crate::client::ListingSort;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ListingSort, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

mod ym_str {
    use crate::date::YearMonth;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<YearMonth>, D::Error> {
        let s: Option<String> = Option::deserialize(d)?;
        match s {
            None => Ok(None),
            Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}
