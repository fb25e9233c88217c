pub mod file;
pub mod gateway;
pub mod store;
pub mod supabase;

pub use file::FileStore;
pub use gateway::{CacheGateway, DataSource, Fetched, PullRequestHistory, ReadThrough, read_through};
pub use store::{CacheStore, PullRequestRow, RepositoryRow};
pub use supabase::SupabaseStore;

use std::sync::Arc;

use tracing::info;

use crate::util::config::{AppConfig, StoreBackend};

/// Build the store selected by the configuration.
pub fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CacheStore>> {
    match config.store.backend {
        StoreBackend::File => {
            let dir = config.store_dir();
            info!(dir = %dir.display(), "Using file store");
            Ok(Arc::new(FileStore::new(dir)))
        }
        StoreBackend::Supabase => {
            info!("Using Supabase store");
            Ok(Arc::new(SupabaseStore::new(&config.store)?))
        }
    }
}
