use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{HubError, Result};
use crate::util::time::cycle_days;

const MAX_LOGIN_LEN: usize = 39;
const MAX_REPO_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner_username: String,
    pub language: Option<String>,
    pub stargazers_count: u64,
    pub open_issues_count: u64,
    pub owner: RepoOwner,
}

impl Repository {
    /// Owner login as GitHub spells it, used to build API paths.
    pub fn owner_login(&self) -> &str {
        &self.owner.login
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub repo_id: u64,
    pub title: String,
    pub cycle_days: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
}

/// Caller-supplied risk label. Nothing in the crate derives one from GitHub data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: Option<DateTime<Utc>>,
}

/// Repository object as returned by `GET /users/{user}/repos`. Only the
/// fields the dashboard reads are declared; the rest are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepoPayload {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub owner: Option<RepoOwner>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
}

/// Pull request object as returned by `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubPullPayload {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

impl GithubRepoPayload {
    pub fn into_repository(self, queried_owner: &str) -> Repository {
        let owner = self.owner.unwrap_or_else(|| RepoOwner {
            login: queried_owner.to_string(),
        });
        let full_name = self
            .full_name
            .unwrap_or_else(|| format!("{}/{}", owner.login, self.name));
        Repository {
            id: self.id,
            name: self.name,
            full_name,
            owner_username: queried_owner.to_lowercase(),
            language: self.language,
            stargazers_count: self.stargazers_count,
            open_issues_count: self.open_issues_count,
            owner,
        }
    }
}

impl GithubPullPayload {
    /// Merge time wins over close time. Returns `None` for a PR that is still open.
    pub fn into_pull_request(self, repo_id: u64) -> Option<PullRequest> {
        let finished = self.merged_at.or(self.closed_at)?;
        Some(PullRequest {
            id: self.id,
            repo_id,
            title: self.title,
            cycle_days: cycle_days(&self.created_at, &finished),
            risk_score: None,
        })
    }
}

/// Convert raw repository objects into typed entities. Objects that do not
/// match the expected shape are logged and dropped.
pub fn parse_repositories(items: &[Value], queried_owner: &str) -> Vec<Repository> {
    items
        .iter()
        .filter_map(
            |item| match serde_json::from_value::<GithubRepoPayload>(item.clone()) {
                Ok(payload) => Some(payload.into_repository(queried_owner)),
                Err(e) => {
                    warn!(owner = queried_owner, error = %e, "Skipping malformed repository payload");
                    None
                }
            },
        )
        .collect()
}

pub fn parse_pull_requests(items: &[Value], repo_id: u64) -> Vec<PullRequest> {
    items
        .iter()
        .filter_map(
            |item| match serde_json::from_value::<GithubPullPayload>(item.clone()) {
                Ok(payload) => payload.into_pull_request(repo_id),
                Err(e) => {
                    warn!(repo_id = repo_id, error = %e, "Skipping malformed pull request payload");
                    None
                }
            },
        )
        .collect()
}

/// GitHub logins are 1 to 39 ASCII letters, digits or hyphens and never start
/// with a hyphen. Anything else is refused before it reaches a URL path.
pub fn check_login(login: &str) -> Result<&str> {
    let valid = !login.is_empty()
        && login.len() <= MAX_LOGIN_LEN
        && !login.starts_with('-')
        && login.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(login)
    } else {
        Err(HubError::invalid(format!("not a GitHub login: {login:?}")))
    }
}

/// Repository names allow letters, digits, `-`, `_` and `.`, but not the
/// path segments `.` and `..`.
pub fn check_repo_name(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name.len() <= MAX_REPO_NAME_LEN
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(name)
    } else {
        Err(HubError::invalid(format!("not a GitHub repository name: {name:?}")))
    }
}
