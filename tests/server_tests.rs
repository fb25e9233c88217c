mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use common::{FakeGithub, many_repos, pull_json};
use devhub::cache::{CacheGateway, FileStore};
use devhub::server::{AppState, build_router};
use devhub::util::config::ServerConfig;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

fn app(github: FakeGithub) -> (TempDir, Arc<FakeGithub>, Router) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(dir.path().to_path_buf()));
    let github = Arc::new(github);
    let gateway = CacheGateway::new(store, github.clone());
    let router = build_router(
        AppState::new(gateway, github.clone()),
        &ServerConfig::default(),
    );
    (dir, github, router)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let resp = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_root_health_message() {
    let (_dir, _github, router) = app(FakeGithub::new(Vec::new()));

    let (status, body) = get(&router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "AI Dev Productivity Hub backend running");
}

#[tokio::test]
async fn test_proxy_requires_username() {
    let (_dir, github, router) = app(FakeGithub::new(Vec::new()));

    let (status, body) = get(&router, "/api/github/repos").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username required");

    let (status, _) = get(&router, "/api/github/repos?username=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(github.repo_calls(), 0);
}

#[tokio::test]
async fn test_proxy_passes_repos_through() {
    let (_dir, github, router) = app(FakeGithub::new(many_repos(150, "octocat")));

    let (status, body) = get(&router, "/api/github/repos?username=octocat").await;
    assert_eq!(status, StatusCode::OK);
    let repos = body.as_array().unwrap();
    assert_eq!(repos.len(), 150);
    // Fields outside the typed model survive the proxy
    assert_eq!(repos[0]["private"], false);
    assert_eq!(github.page_requests(), 2);
}

#[tokio::test]
async fn test_proxy_rejects_path_traversal_login() {
    let (_dir, github, router) = app(FakeGithub::new(many_repos(1, "octocat")));

    let (status, body) = get(
        &router,
        "/api/github/repos?username=..%2Fuser%2Frepos%3Fvisibility%3Dprivate%26x%3D",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("GitHub login"));

    let (status, _) = get(&router, "/api/users/u1/repos?owner=octo%2Fcat").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(github.repo_calls(), 0);
}

#[tokio::test]
async fn test_proxy_upstream_failure_is_500() {
    let github = FakeGithub::new(many_repos(1, "octocat"));
    github.set_failing(true);
    let (_dir, _github, router) = app(github);

    let (status, body) = get(&router, "/api/github/repos?username=octocat").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to fetch repos");
}

#[tokio::test]
async fn test_cached_repositories_endpoint() {
    let (_dir, github, router) = app(FakeGithub::new(many_repos(3, "octocat")));

    let (status, body) = get(&router, "/api/users/u1/repos?owner=octocat").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "live");
    assert_eq!(body["repositories"].as_array().unwrap().len(), 3);

    let (_, body) = get(&router, "/api/users/u1/repos?owner=OctoCat").await;
    assert_eq!(body["source"], "cache");

    let (_, body) = get(&router, "/api/users/u1/repos?owner=octocat&refresh=true").await;
    assert_eq!(body["source"], "live");
    assert_eq!(github.repo_calls(), 2);
}

#[tokio::test]
async fn test_cached_repositories_requires_owner() {
    let (_dir, _github, router) = app(FakeGithub::new(Vec::new()));

    let (status, body) = get(&router, "/api/users/u1/repos").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Owner required");
}

#[tokio::test]
async fn test_pull_requests_for_uncached_repo_is_404() {
    let (_dir, _github, router) = app(FakeGithub::new(Vec::new()));

    let (status, _) = get(&router, "/api/users/u1/repos/1/pulls").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pull_requests_with_window() {
    let pulls = (1..=10)
        .map(|i| {
            let closed_at = format!("2024-01-{:02}T00:00:00Z", i + 1);
            pull_json(i, &format!("pr {i}"), "2024-01-01T00:00:00Z", Some(closed_at.as_str()))
        })
        .collect();
    let (_dir, _github, router) = app(FakeGithub::new(many_repos(1, "octocat")).with_pulls(pulls));
    get(&router, "/api/users/u1/repos?owner=octocat").await;

    let (status, body) = get(&router, "/api/users/u1/repos/1/pulls").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["total"], 10);
    assert_eq!(body["metrics"]["average_cycle_days"], 5.5);

    let (_, body) = get(&router, "/api/users/u1/repos/1/pulls?window=50").await;
    assert_eq!(body["source"], "cache");
    let titles: Vec<&str> = body["pull_requests"]
        .as_array()
        .unwrap()
        .iter()
        .map(|pr| pr["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["pr 1", "pr 2", "pr 3", "pr 4", "pr 5"]);
    assert_eq!(body["metrics"]["average_cycle_days"], 3.0);

    let (status, _) = get(&router, "/api/users/u1/repos/1/pulls?window=150").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_repository_pulse_endpoint() {
    let (_dir, _github, router) = app(FakeGithub::new(many_repos(1, "octocat")));
    get(&router, "/api/users/u1/repos?owner=octocat").await;

    let (status, body) = get(&router, "/api/users/u1/repos/1/pulse").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["repository_id"], 1);
    assert_eq!(body["activity_bars"].as_array().unwrap().len(), 15);
    assert_eq!(body["suggested_devs"], 2);
}

#[tokio::test]
async fn test_repository_pulse_uses_cached_issue_count() {
    let mut repos = vec![common::repo_json(9, "busy", "octocat", 1200)];
    repos[0]["open_issues_count"] = serde_json::json!(40);
    let (_dir, _github, router) = app(FakeGithub::new(repos));
    get(&router, "/api/users/u1/repos?owner=octocat").await;

    let (status, body) = get(&router, "/api/users/u1/repos/9/pulse").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pulse"]["success_rate"], 97.8);
    assert_eq!(body["pulse"]["lead_time_hours"], 5.4);
    assert_eq!(body["pulse"]["deploys_per_week"], 14);
}

#[tokio::test]
async fn test_simulate_explicit_and_seeded() {
    let (_dir, _github, router) = app(FakeGithub::new(Vec::new()));

    let (status, body) = get(&router, "/api/simulate?complexity=50&devs=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["projected_days"], 35);
    assert_eq!(body["success_probability"], 72.7);

    let (_, body) = get(&router, "/api/simulate?risk=High&stars=450").await;
    assert_eq!(body["complexity"], 85.0);
    assert_eq!(body["devs"], 4);

    let (status, body) = get(&router, "/api/simulate?complexity=50&devs=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("devs"));
}
