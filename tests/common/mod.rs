#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use devhub::error::{HubError, Result};
use devhub::github::{GithubSource, PageSource, Pager};

/// Serves a fixed list of page bodies; page N is `pages[N - 1]`, anything past
/// the end is `[]`.
pub struct FakePages {
    pub pages: Vec<Value>,
    pub fail_on: Option<u32>,
    pub always_full: Option<usize>,
    pub requests: AtomicU32,
}

impl FakePages {
    pub fn new(pages: Vec<Value>) -> Self {
        Self {
            pages,
            fail_on: None,
            always_full: None,
            requests: AtomicU32::new(0),
        }
    }

    /// Split `items` into pages of `per_page`, the way GitHub would.
    pub fn from_items(items: Vec<Value>, per_page: usize) -> Self {
        let pages = items
            .chunks(per_page)
            .map(|chunk| Value::Array(chunk.to_vec()))
            .collect();
        Self::new(pages)
    }

    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for FakePages {
    async fn fetch_page(&self, page: u32, _per_page: u32) -> Result<Value> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some(page) {
            return Err(HubError::Upstream {
                status: 502,
                message: "bad gateway".into(),
            });
        }
        if let Some(n) = self.always_full {
            return Ok(Value::Array((0..n).map(|i| json!({ "id": i })).collect()));
        }
        Ok(self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_else(|| json!([])))
    }

    fn describe(&self) -> String {
        "fake".into()
    }
}

/// In-memory GitHub with call counters. Collections are served through the
/// real pager so page counts behave like the API.
pub struct FakeGithub {
    pub repos: Mutex<Vec<Value>>,
    pub pulls: Mutex<Vec<Value>>,
    pub per_page: usize,
    pub fail: AtomicBool,
    pub repo_calls: AtomicU32,
    pub pull_calls: AtomicU32,
    pub page_requests: AtomicU32,
}

impl FakeGithub {
    pub fn new(repos: Vec<Value>) -> Self {
        Self {
            repos: Mutex::new(repos),
            pulls: Mutex::new(Vec::new()),
            per_page: 100,
            fail: AtomicBool::new(false),
            repo_calls: AtomicU32::new(0),
            pull_calls: AtomicU32::new(0),
            page_requests: AtomicU32::new(0),
        }
    }

    pub fn with_pulls(self, pulls: Vec<Value>) -> Self {
        *self.pulls.lock().unwrap() = pulls;
        self
    }

    pub fn set_repos(&self, repos: Vec<Value>) {
        *self.repos.lock().unwrap() = repos;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn repo_calls(&self) -> u32 {
        self.repo_calls.load(Ordering::SeqCst)
    }

    pub fn pull_calls(&self) -> u32 {
        self.pull_calls.load(Ordering::SeqCst)
    }

    pub fn page_requests(&self) -> u32 {
        self.page_requests.load(Ordering::SeqCst)
    }

    async fn paginate(&self, items: Vec<Value>) -> Result<Vec<Value>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(HubError::Upstream {
                status: 500,
                message: "boom".into(),
            });
        }
        let pages = FakePages::from_items(items, self.per_page);
        let result = Pager::new(self.per_page as u32, 50).collect(&pages).await;
        self.page_requests
            .fetch_add(pages.requests(), Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl GithubSource for FakeGithub {
    async fn user_repos(&self, _username: &str) -> Result<Vec<Value>> {
        self.repo_calls.fetch_add(1, Ordering::SeqCst);
        let items = self.repos.lock().unwrap().clone();
        self.paginate(items).await
    }

    async fn closed_pulls(&self, _owner: &str, _repo: &str) -> Result<Vec<Value>> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        let items = self.pulls.lock().unwrap().clone();
        self.paginate(items).await
    }
}

pub fn repo_json(id: u64, name: &str, owner: &str, stars: u64) -> Value {
    json!({
        "id": id,
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "owner": { "login": owner, "id": 1 },
        "language": "Rust",
        "stargazers_count": stars,
        "open_issues_count": 2,
        "private": false,
    })
}

pub fn pull_json(id: u64, title: &str, created_at: &str, closed_at: Option<&str>) -> Value {
    json!({
        "id": id,
        "number": id,
        "title": title,
        "state": if closed_at.is_some() { "closed" } else { "open" },
        "created_at": created_at,
        "closed_at": closed_at,
        "merged_at": Value::Null,
    })
}

pub fn many_repos(count: u64, owner: &str) -> Vec<Value> {
    (1..=count)
        .map(|i| repo_json(i, &format!("repo-{i}"), owner, i))
        .collect()
}
