use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::store::{CacheStore, PullRequestRow, RepositoryRow};
use crate::error::{HubError, Result};
use crate::util::config::StoreConfig;

const REPOSITORIES: &str = "repositories";
const PULL_REQUESTS: &str = "pull_requests";
const CONFLICT_KEY: &str = "id,user_id";

/// Store backed by a Supabase project, spoken to through its PostgREST API.
#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(config: &StoreConfig) -> anyhow::Result<Self> {
        let (Some(url), Some(key)) = (&config.supabase_url, &config.supabase_key) else {
            bail!("Supabase backend requires both supabase_url and supabase_key");
        };
        if !url.starts_with("https://") && !url.starts_with("http://localhost") {
            bail!("Supabase URL must use HTTPS: {}", url);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key: key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(table: &str, resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        Err(HubError::Store(format!("{table}: {status}: {text}")))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*"), ("order", "id.asc")])
            .query(filters);
        let resp = self.authorized(request).send().await?;
        let rows = Self::check(table, resp).await?.json::<Vec<T>>().await?;
        debug!(table = table, count = rows.len(), "Select complete");
        Ok(rows)
    }

    async fn upsert<T: Serialize + Sync>(&self, table: &str, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .post(self.table_url(table))
            .query(&[("on_conflict", CONFLICT_KEY)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);
        let resp = self.authorized(request).send().await?;
        Self::check(table, resp).await?;
        debug!(table = table, count = rows.len(), "Upsert complete");
        Ok(())
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl CacheStore for SupabaseStore {
    async fn select_repositories(
        &self,
        user_id: &str,
        owner_username: &str,
    ) -> Result<Vec<RepositoryRow>> {
        self.select(
            REPOSITORIES,
            &[
                ("owner_username", eq(owner_username)),
                ("user_id", eq(user_id)),
            ],
        )
        .await
    }

    async fn select_repository(
        &self,
        user_id: &str,
        repo_id: u64,
    ) -> Result<Option<RepositoryRow>> {
        let rows: Vec<RepositoryRow> = self
            .select(
                REPOSITORIES,
                &[("id", eq(repo_id)), ("user_id", eq(user_id))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_repositories(&self, rows: &[RepositoryRow]) -> Result<()> {
        self.upsert(REPOSITORIES, rows).await
    }

    async fn select_pull_requests(
        &self,
        user_id: &str,
        repo_id: u64,
    ) -> Result<Vec<PullRequestRow>> {
        self.select(
            PULL_REQUESTS,
            &[("repo_id", eq(repo_id)), ("user_id", eq(user_id))],
        )
        .await
    }

    async fn upsert_pull_requests(&self, rows: &[PullRequestRow]) -> Result<()> {
        self.upsert(PULL_REQUESTS, rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: Option<&str>, key: Option<&str>) -> StoreConfig {
        StoreConfig {
            supabase_url: url.map(String::from),
            supabase_key: key.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_url_and_key() {
        assert!(SupabaseStore::new(&config(None, Some("k"))).is_err());
        assert!(SupabaseStore::new(&config(Some("https://x.supabase.co"), None)).is_err());
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let store = SupabaseStore::new(&config(Some("https://x.supabase.co/"), Some("k"))).unwrap();
        assert_eq!(
            store.table_url(REPOSITORIES),
            "https://x.supabase.co/rest/v1/repositories"
        );
    }

    #[test]
    fn test_eq_filter() {
        assert_eq!(eq("octocat"), "eq.octocat");
        assert_eq!(eq(42u64), "eq.42");
    }
}
