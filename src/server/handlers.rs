use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::AppState;
use super::error::{ApiError, ApiResult};
use crate::cache::DataSource;
use crate::github::models::{PullRequest, Repository, RiskLevel, check_login};
use crate::metrics::{self, Metrics, Projection, RepositoryPulse};

const ACTIVITY_BAR_COUNT: usize = 15;

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "AI Dev Productivity Hub backend running" }))
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub username: Option<String>,
}

/// `GET /api/github/repos?username=`: every repository of a user, as GitHub
/// returns them.
pub async fn proxy_repos(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let username = query
        .username
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Username required"))?;
    let username = check_login(username.trim())?;

    let repos = state
        .github
        .user_repos(username)
        .await
        .map_err(|e| ApiError::from_hub(e, "Failed to fetch repos"))?;

    Ok(Json(repos))
}

#[derive(Debug, Deserialize)]
pub struct RepositoriesQuery {
    pub owner: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct RepositoriesResponse {
    pub source: DataSource,
    pub repositories: Vec<Repository>,
}

pub async fn list_repositories(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<RepositoriesQuery>,
) -> ApiResult<Json<RepositoriesResponse>> {
    let owner = query
        .owner
        .filter(|o| !o.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Owner required"))?;

    let fetched = state
        .gateway
        .get_repositories(owner.trim(), &user_id, query.refresh)
        .await
        .map_err(|e| ApiError::from_hub(e, "Failed to fetch repos"))?;

    Ok(Json(RepositoriesResponse {
        source: fetched.source,
        repositories: fetched.items,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PullRequestsQuery {
    #[serde(default)]
    pub refresh: bool,
    /// Percentage of history to keep, counted from the oldest pull request.
    pub window: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PullRequestsResponse {
    pub source: DataSource,
    pub pull_requests: Vec<PullRequest>,
    pub metrics: Metrics,
}

async fn cached_repository(state: &AppState, user_id: &str, repo_id: u64) -> ApiResult<Repository> {
    state
        .gateway
        .cached_repository(user_id, repo_id)
        .await
        .map_err(|e| ApiError::from_hub(e, "Failed to read repository"))?
        .ok_or_else(|| ApiError::not_found(format!("Repository {repo_id} is not cached for this user")))
}

pub async fn list_pull_requests(
    State(state): State<AppState>,
    Path((user_id, repo_id)): Path<(String, u64)>,
    Query(query): Query<PullRequestsQuery>,
) -> ApiResult<Json<PullRequestsResponse>> {
    let repo = cached_repository(&state, &user_id, repo_id).await?;

    let history = state
        .gateway
        .get_pull_requests(&repo, &user_id, query.refresh)
        .await
        .map_err(|e| ApiError::from_hub(e, "Failed to fetch pull requests"))?;

    let (pull_requests, summary) = match query.window {
        Some(percent) => {
            let window = metrics::windowed_subset(&history.pull_requests, percent)?.to_vec();
            debug!(percent, kept = window.len(), "Applied history window");
            let windowed = metrics::summarize(&window);
            (window, windowed)
        }
        None => (history.pull_requests, history.metrics),
    };

    Ok(Json(PullRequestsResponse {
        source: history.source,
        pull_requests,
        metrics: summary,
    }))
}

#[derive(Debug, Serialize)]
pub struct PulseResponse {
    pub repository_id: u64,
    pub pulse: RepositoryPulse,
    pub activity_bars: Vec<u64>,
    pub suggested_devs: u32,
}

pub async fn repository_pulse(
    State(state): State<AppState>,
    Path((user_id, repo_id)): Path<(String, u64)>,
) -> ApiResult<Json<PulseResponse>> {
    let repo = cached_repository(&state, &user_id, repo_id).await?;

    Ok(Json(PulseResponse {
        repository_id: repo.id,
        pulse: metrics::repository_pulse(&repo),
        activity_bars: metrics::activity_bars(Some(repo.id).filter(|id| *id != 0), ACTIVITY_BAR_COUNT),
        suggested_devs: metrics::suggested_dev_count(repo.stargazers_count),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SimulateQuery {
    pub complexity: Option<f64>,
    pub devs: Option<u32>,
    pub risk: Option<RiskLevel>,
    pub stars: Option<u64>,
}

/// Explicit `complexity` / `devs` win; otherwise they are seeded from `risk`
/// and `stars`.
pub async fn simulate(Query(query): Query<SimulateQuery>) -> ApiResult<Json<Projection>> {
    let complexity = query
        .complexity
        .unwrap_or_else(|| metrics::suggested_complexity(query.risk));
    let devs = query
        .devs
        .unwrap_or_else(|| metrics::suggested_dev_count(query.stars.unwrap_or(0)));

    Ok(Json(metrics::project(complexity, devs)?))
}
