use super::wire::{bare_id, parse_comment_listing, parse_listing, parse_more_children, parse_thread};
use super::{ClientError, ClientResult, ContentSource, ListingSort, Page, RateLimiter};
use crate::config::ClientOptions;
use crate::model::{ForestNode, MoreStub, Submission};
use parking_lot::Mutex;
use reqwest::blocking::{Client, Response};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// `/api/morechildren` accepts at most this many ids per call.
const MORE_CHILDREN_BATCH: usize = 100;
const LISTING_PAGE_MAX: usize = 100;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct Token {
    value: String,
    expires_at: Instant,
}

/// Authenticated, rate-limited client for the Reddit OAuth API (app-only grant).
///
/// One handle is built from [`ClientOptions`] and passed to every stage; all
/// requests go through its [`RateLimiter`].
pub struct RedditClient {
    http: Client,
    opts: ClientOptions,
    token: Mutex<Option<Token>>,
    limiter: RateLimiter,
}

impl RedditClient {
    /// Build the client and authenticate once, so bad credentials fail at setup.
    pub fn connect(opts: ClientOptions) -> ClientResult<Self> {
        let http = Client::builder()
            .user_agent(opts.credentials.user_agent.clone())
            .timeout(Duration::from_secs(opts.timeout_secs.max(1)))
            .build()
            .map_err(|e| ClientError::Api { status: 0, message: format!("http client: {e}") })?;
        let limiter = RateLimiter::new(Duration::from_millis(opts.min_interval_ms));
        let client = Self { http, opts, token: Mutex::new(None), limiter };
        client.refresh_token()?;
        tracing::info!("authenticated against {}", client.opts.api_base);
        Ok(client)
    }

    fn refresh_token(&self) -> ClientResult<String> {
        self.limiter.wait();
        let creds = &self.opts.credentials;
        let resp = self
            .http
            .post(&self.opts.auth_url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::Auth(format!("token endpoint returned {status}")));
        }
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(ClientError::Api { status: status.as_u16(), message: body });
        }
        let tok: TokenResponse = resp.json()?;
        if tok.access_token.is_empty() {
            return Err(ClientError::Auth("token endpoint returned no access token".into()));
        }
        // Renew a minute early.
        let ttl = Duration::from_secs(tok.expires_in.max(120) - 60);
        let value = tok.access_token;
        *self.token.lock() = Some(Token { value: value.clone(), expires_at: Instant::now() + ttl });
        Ok(value)
    }

    fn bearer(&self) -> ClientResult<String> {
        {
            let guard = self.token.lock();
            if let Some(t) = guard.as_ref() {
                if Instant::now() < t.expires_at {
                    return Ok(t.value.clone());
                }
            }
        }
        self.refresh_token()
    }

    fn observe_headers(&self, headers: &HeaderMap) {
        let num = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<f64>().ok())
        };
        self.limiter.observe(num("x-ratelimit-remaining"), num("x-ratelimit-reset"));
    }

    /// GET `path` (relative to the API base) with retries on transient failures.
    fn get_json(&self, path: &str, query: &[(&str, String)]) -> ClientResult<Value> {
        let url = format!("{}{}", self.opts.api_base.trim_end_matches('/'), path);
        let tries = self.opts.max_retries + 1;
        let mut last = String::new();
        let mut reauthed = false;

        for attempt in 0..tries {
            if attempt > 0 {
                let delay = Duration::from_millis(self.opts.backoff_ms.saturating_mul(attempt as u64));
                tracing::warn!("retrying {} in {:.1}s (attempt {}/{}): {}", path, delay.as_secs_f64(), attempt + 1, tries, last);
                sleep(delay);
            }
            let token = self.bearer()?;
            self.limiter.wait();
            tracing::debug!("GET {}", path);
            let sent = self.http.get(&url).bearer_auth(&token).query(query).send();
            let resp: Response = match sent {
                Ok(r) => r,
                Err(e) => {
                    let err = ClientError::from(e);
                    if err.is_transient() {
                        last = err.to_string();
                        continue;
                    }
                    return Err(err);
                }
            };
            self.observe_headers(resp.headers());
            let status = resp.status();
            match status {
                s if s.is_success() => return Ok(resp.json::<Value>()?),
                StatusCode::UNAUTHORIZED if !reauthed => {
                    reauthed = true;
                    *self.token.lock() = None;
                    last = "token rejected".into();
                }
                StatusCode::UNAUTHORIZED => return Err(ClientError::Auth(format!("{path}: {status}"))),
                StatusCode::NOT_FOUND | StatusCode::FORBIDDEN | StatusCode::GONE => {
                    return Err(ClientError::NotFound(format!("{path}: {status}")));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    self.limiter.penalize(Duration::from_millis(self.opts.backoff_ms));
                    last = format!("{path}: {status}");
                }
                s if s.is_server_error() => last = format!("{path}: {status}"),
                _ => {
                    let body = resp.text().unwrap_or_default();
                    return Err(ClientError::Api { status: status.as_u16(), message: body });
                }
            }
        }
        Err(ClientError::Transient(last))
    }
}

impl ContentSource for RedditClient {
    fn list_submissions(
        &self,
        community: &str,
        sort: ListingSort,
        limit: usize,
        after: Option<&str>,
    ) -> ClientResult<Page> {
        let mut query = vec![
            ("limit", limit.clamp(1, LISTING_PAGE_MAX).to_string()),
            ("raw_json", "1".to_string()),
        ];
        if let ListingSort::Top(window) = sort {
            query.push(("t", window.as_str().to_string()));
        }
        if let Some(a) = after {
            query.push(("after", a.to_string()));
        }
        let v = self.get_json(&format!("/r/{}/{}", community, sort.path()), &query)?;
        parse_listing(&v)
    }

    fn search_submissions(&self, community: &str, query: &str, limit: usize) -> ClientResult<Vec<Submission>> {
        let params = [
            ("q", query.to_string()),
            ("restrict_sr", "1".to_string()),
            ("sort", "relevance".to_string()),
            ("limit", limit.clamp(1, LISTING_PAGE_MAX).to_string()),
            ("raw_json", "1".to_string()),
        ];
        let v = self.get_json(&format!("/r/{community}/search"), &params)?;
        Ok(parse_listing(&v)?.submissions)
    }

    fn get_submission(&self, id: &str) -> ClientResult<Submission> {
        let params = [("limit", "1".to_string()), ("depth", "1".to_string()), ("raw_json", "1".to_string())];
        let v = self.get_json(&format!("/comments/{}", bare_id(id)), &params)?;
        Ok(parse_thread(&v)?.0)
    }

    fn get_comment_forest(&self, submission_id: &str, expand_depth: u32) -> ClientResult<Vec<ForestNode>> {
        let params = [
            ("depth", expand_depth.max(1).to_string()),
            ("limit", "500".to_string()),
            ("sort", "old".to_string()),
            ("raw_json", "1".to_string()),
        ];
        let v = self.get_json(&format!("/comments/{}", bare_id(submission_id)), &params)?;
        Ok(parse_thread(&v)?.1)
    }

    fn expand_more(&self, submission_id: &str, stub: &MoreStub) -> ClientResult<Vec<ForestNode>> {
        let link = format!("t3_{}", bare_id(submission_id));
        if stub.is_continue_thread() {
            // Re-fetch the thread rooted at the parent comment and hand back its replies.
            let parent = bare_id(&stub.parent_id).to_string();
            let params = [("comment", parent.clone()), ("raw_json", "1".to_string())];
            let v = self.get_json(&format!("/comments/{}", bare_id(submission_id)), &params)?;
            let forest = v.as_array().and_then(|a| a.get(1)).map(parse_comment_listing).unwrap_or_default();
            return Ok(forest
                .into_iter()
                .flat_map(|n| match n {
                    ForestNode::Comment(c) if c.id == parent => c.replies,
                    other => vec![other],
                })
                .collect());
        }

        let mut out = Vec::new();
        for batch in stub.children.chunks(MORE_CHILDREN_BATCH) {
            let params = [
                ("api_type", "json".to_string()),
                ("link_id", link.clone()),
                ("children", batch.join(",")),
                ("limit_children", "false".to_string()),
                ("raw_json", "1".to_string()),
            ];
            let v = self.get_json("/api/morechildren", &params)?;
            out.extend(parse_more_children(&v)?);
        }
        Ok(out)
    }
}
