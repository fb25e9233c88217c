use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::store::{CacheStore, PullRequestRow, RepositoryRow};
use crate::error::Result;
use crate::github::models::{
    PullRequest, Repository, check_login, parse_pull_requests, parse_repositories,
};
use crate::github::rest::GithubSource;
use crate::metrics::{Metrics, summarize};

/// Where a gateway result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Cache,
    Live,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fetched<T> {
    pub source: DataSource,
    pub items: Vec<T>,
}

/// The three phases of a read-through lookup for one cache partition.
#[async_trait]
pub trait ReadThrough: Send + Sync {
    type Item: Send + Sync;

    /// Rows already persisted for the partition. Empty means miss.
    async fn lookup(&self) -> Result<Vec<Self::Item>>;

    /// Pull the partition from the source of truth.
    async fn fallback(&self) -> Result<Vec<Self::Item>>;

    /// Store freshly fetched items. Never called with an empty slice.
    async fn persist(&self, items: &[Self::Item]) -> Result<()>;

    fn partition(&self) -> String;
}

/// Run lookup → fallback → persist.
///
/// A persist failure is logged and swallowed: the live items are still
/// returned. A fallback that yields nothing leaves the store untouched.
pub async fn read_through<S>(strategy: &S, force_refresh: bool) -> Result<Fetched<S::Item>>
where
    S: ReadThrough + ?Sized,
{
    let partition = strategy.partition();

    if !force_refresh {
        let cached = strategy.lookup().await?;
        if !cached.is_empty() {
            debug!(partition = %partition, count = cached.len(), "Cache hit");
            return Ok(Fetched {
                source: DataSource::Cache,
                items: cached,
            });
        }
        debug!(partition = %partition, "Cache miss");
    }

    let live = strategy.fallback().await?;
    if live.is_empty() {
        debug!(partition = %partition, "Source returned no items, cache untouched");
        return Ok(Fetched {
            source: DataSource::Live,
            items: live,
        });
    }

    if let Err(e) = strategy.persist(&live).await {
        warn!(partition = %partition, error = %e, "Failed to persist live data");
    }

    Ok(Fetched {
        source: DataSource::Live,
        items: live,
    })
}

struct RepositoryPartition<'a> {
    store: &'a dyn CacheStore,
    github: &'a dyn GithubSource,
    owner: &'a str,
    user_id: &'a str,
}

#[async_trait]
impl<'a> ReadThrough for RepositoryPartition<'a> {
    type Item = Repository;

    async fn lookup(&self) -> Result<Vec<Repository>> {
        let rows = self
            .store
            .select_repositories(self.user_id, &self.owner.to_lowercase())
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_repository(self.owner))
            .collect())
    }

    async fn fallback(&self) -> Result<Vec<Repository>> {
        let raw = self.github.user_repos(self.owner).await?;
        Ok(parse_repositories(&raw, self.owner))
    }

    async fn persist(&self, items: &[Repository]) -> Result<()> {
        let rows: Vec<RepositoryRow> = items
            .iter()
            .map(|repo| RepositoryRow::from_repository(repo, self.user_id))
            .collect();
        self.store.upsert_repositories(&rows).await
    }

    fn partition(&self) -> String {
        format!("repos:{}:{}", self.user_id, self.owner.to_lowercase())
    }
}

struct PullRequestPartition<'a> {
    store: &'a dyn CacheStore,
    github: &'a dyn GithubSource,
    repo: &'a Repository,
    user_id: &'a str,
}

#[async_trait]
impl<'a> ReadThrough for PullRequestPartition<'a> {
    type Item = PullRequest;

    async fn lookup(&self) -> Result<Vec<PullRequest>> {
        let rows = self
            .store
            .select_pull_requests(self.user_id, self.repo.id)
            .await?;
        Ok(oldest_first(
            rows.into_iter()
                .map(PullRequestRow::into_pull_request)
                .collect(),
        ))
    }

    async fn fallback(&self) -> Result<Vec<PullRequest>> {
        let raw = self
            .github
            .closed_pulls(self.repo.owner_login(), &self.repo.name)
            .await?;
        Ok(oldest_first(parse_pull_requests(&raw, self.repo.id)))
    }

    async fn persist(&self, items: &[PullRequest]) -> Result<()> {
        // PR rows must point at a repository cached for the same user.
        if self
            .store
            .select_repository(self.user_id, self.repo.id)
            .await?
            .is_none()
        {
            let parent = RepositoryRow::from_repository(self.repo, self.user_id);
            self.store.upsert_repositories(&[parent]).await?;
        }

        let rows: Vec<PullRequestRow> = items
            .iter()
            .map(|pr| PullRequestRow::from_pull_request(pr, self.user_id, &self.repo.owner_username))
            .collect();
        self.store.upsert_pull_requests(&rows).await
    }

    fn partition(&self) -> String {
        format!("pulls:{}:{}", self.user_id, self.repo.id)
    }
}

/// GitHub ids grow with creation time, so id order is history order whichever
/// side the rows came from.
fn oldest_first(mut prs: Vec<PullRequest>) -> Vec<PullRequest> {
    prs.sort_by_key(|pr| pr.id);
    prs
}

/// Pull requests oldest first, with metrics over all of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestHistory {
    pub source: DataSource,
    pub pull_requests: Vec<PullRequest>,
    pub metrics: Metrics,
}

/// Read-through cache of repositories and pull requests per user.
#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn CacheStore>,
    github: Arc<dyn GithubSource>,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn CacheStore>, github: Arc<dyn GithubSource>) -> Self {
        Self { store, github }
    }

    pub async fn get_repositories(
        &self,
        owner_username: &str,
        user_id: &str,
        force_refresh: bool,
    ) -> Result<Fetched<Repository>> {
        check_login(owner_username)?;
        let partition = RepositoryPartition {
            store: self.store.as_ref(),
            github: self.github.as_ref(),
            owner: owner_username,
            user_id,
        };
        let fetched = read_through(&partition, force_refresh).await?;
        info!(
            owner = owner_username,
            source = ?fetched.source,
            count = fetched.items.len(),
            "Repositories loaded"
        );
        Ok(fetched)
    }

    pub async fn get_pull_requests(
        &self,
        repo: &Repository,
        user_id: &str,
        force_refresh: bool,
    ) -> Result<PullRequestHistory> {
        let partition = PullRequestPartition {
            store: self.store.as_ref(),
            github: self.github.as_ref(),
            repo,
            user_id,
        };
        let fetched = read_through(&partition, force_refresh).await?;
        let metrics = summarize(&fetched.items);
        info!(
            repo = %repo.full_name,
            source = ?fetched.source,
            total = metrics.total,
            "Pull requests loaded"
        );
        Ok(PullRequestHistory {
            source: fetched.source,
            pull_requests: fetched.items,
            metrics,
        })
    }

    /// A repository previously cached for this user.
    pub async fn cached_repository(&self, user_id: &str, repo_id: u64) -> Result<Option<Repository>> {
        Ok(self
            .store
            .select_repository(user_id, repo_id)
            .await?
            .map(|row| {
                let owner = row.owner_username.clone();
                row.into_repository(&owner)
            }))
    }
}
