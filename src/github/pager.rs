use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{HubError, Result};

/// One paginated GitHub collection. Pages are 1-based.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Value>;

    /// Label used in log lines.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy)]
pub struct Pager {
    per_page: u32,
    max_pages: u32,
}

impl Default for Pager {
    fn default() -> Self {
        Self {
            per_page: 100,
            max_pages: 500,
        }
    }
}

impl Pager {
    pub fn new(per_page: u32, max_pages: u32) -> Self {
        Self {
            per_page: per_page.max(1),
            max_pages: max_pages.max(1),
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Fetch every page in order and concatenate the items.
    ///
    /// Stops on an empty page, a non-array body, or a page shorter than
    /// `per_page`. Any fetch error aborts the whole collection.
    pub async fn collect<S>(&self, source: &S) -> Result<Vec<Value>>
    where
        S: PageSource + ?Sized,
    {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            if page > self.max_pages {
                return Err(HubError::PageLimitExceeded {
                    pages: self.max_pages,
                });
            }

            let body = source.fetch_page(page, self.per_page).await?;
            let batch = match body {
                Value::Array(batch) if !batch.is_empty() => batch,
                _ => break,
            };

            let len = batch.len();
            items.extend(batch);
            debug!(source = %source.describe(), page, len, "Fetched page");

            if len < self.per_page as usize {
                break;
            }
            page += 1;
        }

        debug!(source = %source.describe(), count = items.len(), "Pagination complete");
        Ok(items)
    }
}
