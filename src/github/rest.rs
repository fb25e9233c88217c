use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::models::{RateLimit, check_login, check_repo_name};
use super::pager::{PageSource, Pager};
use crate::error::{HubError, Result};
use crate::util::config::GithubConfig;

const GITHUB_API_VERSION: &str = "2022-11-28";

/// The GitHub collections the cache gateway and the proxy read. Items are
/// returned raw so the proxy can pass them through untouched.
#[async_trait]
pub trait GithubSource: Send + Sync {
    async fn user_repos(&self, username: &str) -> Result<Vec<Value>>;

    async fn closed_pulls(&self, owner: &str, repo: &str) -> Result<Vec<Value>>;
}

#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    api_url: String,
    token: Option<String>,
    pager: Pager,
    rate_limit: Arc<Mutex<RateLimit>>,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> anyhow::Result<Self> {
        if !config.api_url.starts_with("https://") {
            bail!("GitHub API URL must use HTTPS: {}", config.api_url);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
            pager: Pager::new(config.per_page, config.max_pages),
            rate_limit: Arc::new(Mutex::new(RateLimit::default())),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Rate limit as reported by the most recent response.
    pub fn rate_limit(&self) -> RateLimit {
        self.rate_limit
            .lock()
            .map(|rl| rl.clone())
            .unwrap_or_default()
    }

    fn endpoint(&self, path: String, extra: Vec<(&'static str, String)>) -> Endpoint<'_> {
        Endpoint {
            client: self,
            path,
            extra,
        }
    }

    async fn get_page(
        &self,
        path: &str,
        extra: &[(&'static str, String)],
        page: u32,
        per_page: u32,
    ) -> Result<Value> {
        let url = format!("{}{}", self.api_url, path);
        let mut request = self
            .client
            .get(&url)
            .query(extra)
            .query(&[("per_page", per_page), ("page", page)]);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        self.update_rate_limit(&resp);
        let resp = self.check_response(resp).await?;

        Ok(resp.json::<Value>().await?)
    }

    fn update_rate_limit(&self, resp: &Response) {
        if let Ok(mut rl) = self.rate_limit.lock() {
            apply_rate_limit_headers(resp.headers(), &mut rl);
        }
    }

    async fn check_response(&self, resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let rl = self.rate_limit();
        if is_rate_limited(status, &rl) {
            let reset_at = rl
                .reset_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            warn!(reset_at = %reset_at, "GitHub rate limit exhausted");
            return Err(HubError::RateLimited { reset_at });
        }

        let message = resp.text().await.unwrap_or_default();
        Err(HubError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl GithubSource for GithubClient {
    async fn user_repos(&self, username: &str) -> Result<Vec<Value>> {
        let username = check_login(username)?;
        let endpoint = self.endpoint(format!("/users/{username}/repos"), Vec::new());
        let repos = self.pager.collect(&endpoint).await?;
        debug!(user = username, count = repos.len(), "Fetched user repos");
        Ok(repos)
    }

    async fn closed_pulls(&self, owner: &str, repo: &str) -> Result<Vec<Value>> {
        let owner = check_login(owner)?;
        let repo = check_repo_name(repo)?;
        // Oldest first, matching the order the stores return
        let endpoint = self.endpoint(
            format!("/repos/{owner}/{repo}/pulls"),
            vec![
                ("state", "closed".to_string()),
                ("sort", "created".to_string()),
                ("direction", "asc".to_string()),
            ],
        );
        let pulls = self.pager.collect(&endpoint).await?;
        debug!(owner = owner, repo = repo, count = pulls.len(), "Fetched closed pulls");
        Ok(pulls)
    }
}

/// Fold GitHub's `x-ratelimit-*` headers into `rl`. Missing or unparseable
/// headers leave the previous value.
fn apply_rate_limit_headers(headers: &HeaderMap, rl: &mut RateLimit) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
    };

    if let Some(limit) = header("x-ratelimit-limit") {
        rl.limit = limit.max(0) as u32;
    }
    if let Some(remaining) = header("x-ratelimit-remaining") {
        rl.remaining = remaining.max(0) as u32;
    }
    if let Some(reset) = header("x-ratelimit-reset") {
        rl.reset_at = DateTime::<Utc>::from_timestamp(reset, 0);
    }
}

/// A 403 or 429 only means "rate limited" when the quota is known and spent;
/// otherwise it is an ordinary upstream failure.
fn is_rate_limited(status: StatusCode, rl: &RateLimit) -> bool {
    matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS)
        && rl.limit > 0
        && rl.remaining == 0
}

/// A collection path bound to a client, ready for the pager.
struct Endpoint<'a> {
    client: &'a GithubClient,
    path: String,
    extra: Vec<(&'static str, String)>,
}

#[async_trait]
impl<'a> PageSource for Endpoint<'a> {
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Value> {
        self.client
            .get_page(&self.path, &self.extra, page, per_page)
            .await
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
}
