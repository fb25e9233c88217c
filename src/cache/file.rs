use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::store::{CacheStore, PullRequestRow, RepositoryRow};
use crate::error::Result;

const REPOSITORIES: &str = "repositories";
const PULL_REQUESTS: &str = "pull_requests";

/// JSON-file backed store for local development and tests. Each table is one
/// file holding every row, sorted by id; upserts replace the file.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableFile<T> {
    updated_at: chrono::DateTime<chrono::Utc>,
    rows: Vec<T>,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    fn path_for_table(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.json"))
    }

    /// A missing file is an empty table. A corrupt one is logged and treated
    /// as empty so the next upsert replaces it.
    async fn read_table<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let path = self.path_for_table(table);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<TableFile<T>>(&content) {
            Ok(file) => Ok(file.rows),
            Err(e) => {
                warn!(table = table, error = %e, "Failed to parse table file");
                Ok(Vec::new())
            }
        }
    }

    async fn write_table<T: Serialize>(&self, table: &str, rows: Vec<T>) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file = TableFile {
            updated_at: chrono::Utc::now(),
            rows,
        };
        let content = serde_json::to_string(&file)?;

        // Readers never take the lock, so swap the file in whole
        let path = self.path_for_table(table);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn upsert<T, K>(&self, table: &str, rows: &[T], key: K) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Clone,
        K: Fn(&T) -> (u64, String),
    {
        let _guard = self.write_lock.lock().await;

        let mut merged: BTreeMap<(u64, String), T> = self
            .read_table::<T>(table)
            .await?
            .into_iter()
            .map(|row| (key(&row), row))
            .collect();
        for row in rows {
            merged.insert(key(row), row.clone());
        }

        let count = merged.len();
        self.write_table(table, merged.into_values().collect()).await?;
        debug!(table = table, upserted = rows.len(), total = count, "Upsert complete");
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn select_repositories(
        &self,
        user_id: &str,
        owner_username: &str,
    ) -> Result<Vec<RepositoryRow>> {
        let rows = self.read_table::<RepositoryRow>(REPOSITORIES).await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.user_id == user_id && r.owner_username == owner_username)
            .collect())
    }

    async fn select_repository(
        &self,
        user_id: &str,
        repo_id: u64,
    ) -> Result<Option<RepositoryRow>> {
        let rows = self.read_table::<RepositoryRow>(REPOSITORIES).await?;
        Ok(rows
            .into_iter()
            .find(|r| r.user_id == user_id && r.id == repo_id))
    }

    async fn upsert_repositories(&self, rows: &[RepositoryRow]) -> Result<()> {
        self.upsert(REPOSITORIES, rows, |r: &RepositoryRow| {
            (r.id, r.user_id.clone())
        })
        .await
    }

    async fn select_pull_requests(
        &self,
        user_id: &str,
        repo_id: u64,
    ) -> Result<Vec<PullRequestRow>> {
        let rows = self.read_table::<PullRequestRow>(PULL_REQUESTS).await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.user_id == user_id && r.repo_id == repo_id)
            .collect())
    }

    async fn upsert_pull_requests(&self, rows: &[PullRequestRow]) -> Result<()> {
        self.upsert(PULL_REQUESTS, rows, |r: &PullRequestRow| {
            (r.id, r.user_id.clone())
        })
        .await
    }
}
