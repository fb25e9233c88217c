use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::github::models::{PullRequest, RepoOwner, Repository};

/// Row of the `repositories` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRow {
    pub id: u64,
    pub name: String,
    pub user_id: String,
    pub owner_username: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub owner_json: Option<Value>,
}

/// Row of the `pull_requests` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRow {
    pub id: u64,
    pub repo_id: u64,
    pub user_id: String,
    pub title: String,
    pub cycle_days: f64,
    pub owner_username: String,
}

impl RepositoryRow {
    pub fn from_repository(repo: &Repository, user_id: &str) -> Self {
        Self {
            id: repo.id,
            name: repo.name.clone(),
            user_id: user_id.to_string(),
            owner_username: repo.owner_username.to_lowercase(),
            language: repo.language.clone(),
            stargazers_count: repo.stargazers_count,
            open_issues_count: repo.open_issues_count,
            owner_json: serde_json::to_value(&repo.owner).ok(),
        }
    }

    /// Rebuild the entity. Owner metadata that is missing or unreadable falls
    /// back to the username the row was queried by.
    pub fn into_repository(self, queried_owner: &str) -> Repository {
        let owner = self
            .owner_json
            .and_then(|v| match serde_json::from_value::<RepoOwner>(v) {
                Ok(owner) => Some(owner),
                Err(e) => {
                    warn!(repo_id = self.id, error = %e, "Unreadable owner_json");
                    None
                }
            })
            .unwrap_or_else(|| RepoOwner {
                login: queried_owner.to_string(),
            });
        Repository {
            id: self.id,
            full_name: format!("{}/{}", owner.login, self.name),
            name: self.name,
            owner_username: self.owner_username,
            language: self.language,
            stargazers_count: self.stargazers_count,
            open_issues_count: self.open_issues_count,
            owner,
        }
    }
}

impl PullRequestRow {
    pub fn from_pull_request(pr: &PullRequest, user_id: &str, owner_username: &str) -> Self {
        Self {
            id: pr.id,
            repo_id: pr.repo_id,
            user_id: user_id.to_string(),
            title: pr.title.clone(),
            cycle_days: pr.cycle_days,
            owner_username: owner_username.to_lowercase(),
        }
    }

    pub fn into_pull_request(self) -> PullRequest {
        PullRequest {
            id: self.id,
            repo_id: self.repo_id,
            title: self.title,
            cycle_days: self.cycle_days,
            risk_score: None,
        }
    }
}

/// The persisted store behind the cache gateway.
///
/// Rows are keyed by `(id, user_id)`. Every select filters by user id; the
/// store never returns rows of another user.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `owner_username` is expected lowercase.
    async fn select_repositories(
        &self,
        user_id: &str,
        owner_username: &str,
    ) -> Result<Vec<RepositoryRow>>;

    async fn select_repository(&self, user_id: &str, repo_id: u64)
    -> Result<Option<RepositoryRow>>;

    async fn upsert_repositories(&self, rows: &[RepositoryRow]) -> Result<()>;

    async fn select_pull_requests(&self, user_id: &str, repo_id: u64)
    -> Result<Vec<PullRequestRow>>;

    async fn upsert_pull_requests(&self, rows: &[PullRequestRow]) -> Result<()>;
}
