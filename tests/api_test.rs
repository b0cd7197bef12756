//! HTTP API tests.

#![cfg(unix)]

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{wait_for, with_server, TestEnv, SOURCE};
use hlsforge::server::{create_router, AppContext};
use hlsforge_common::{JobId, OverallState, RenditionState};
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::Arc;
use tower::ServiceExt;

fn url(addr: &std::net::SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

#[tokio::test]
#[serial]
async fn test_health_check() {
    let env = TestEnv::new();
    let app = create_router(AppContext {
        config: Arc::new(env.config.clone()),
        orchestrator: env.orchestrator(),
    });

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_presets_endpoint() {
    let env = TestEnv::new();
    let app = create_router(AppContext {
        config: Arc::new(env.config.clone()),
        orchestrator: env.orchestrator(),
    });

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/presets")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let presets: Vec<Value> = serde_json::from_slice(&bytes).unwrap();
    let labels: Vec<&str> = presets
        .iter()
        .map(|p| p["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, ["2160p", "1080p", "720p", "480p", "360p"]);
    assert_eq!(presets[2]["video_bitrate"], 3500);
}

#[tokio::test]
#[serial]
async fn test_submit_and_poll_job() {
    let env = TestEnv::new();
    let (orch, addr) = with_server(&env).await;
    let client = reqwest::Client::new();

    let response = client
        .post(url(&addr, "/api/jobs"))
        .json(&json!({
            "job_id": "api-job",
            "source_filename": SOURCE,
            "renditions": ["360p"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["job_id"], "api-job");

    let job_id = JobId::new("api-job").unwrap();
    wait_for(&orch, &job_id, |s| s.overall_state == OverallState::Ok).await;

    let status: Value = client
        .get(url(&addr, "/api/jobs/api-job"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["overall_state"], "ok");
    assert_eq!(status["renditions"]["360p"]["state"], "ok");
    assert_eq!(status["renditions"]["720p"]["state"], "skipped");
    assert_eq!(status["master_manifest_name"], "master.m3u8");

    let jobs: Vec<Value> = client
        .get(url(&addr, "/api/jobs"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["job_id"], "api-job");
}

#[tokio::test]
#[serial]
async fn test_generated_job_id() {
    let env = TestEnv::new();
    let (orch, addr) = with_server(&env).await;

    let response = reqwest::Client::new()
        .post(url(&addr, "/api/jobs"))
        .json(&json!({ "source_filename": SOURCE, "network_mbps": 0.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    let body: Value = response.json().await.unwrap();
    let job_id = JobId::new(body["job_id"].as_str().unwrap()).unwrap();
    let status = wait_for(&orch, &job_id, |s| s.overall_state == OverallState::Ok).await;
    assert_eq!(status.network_mbps, Some(0.5));
}

#[tokio::test]
#[serial]
async fn test_submit_rejections() {
    let env = TestEnv::new();
    let (_orch, addr) = with_server(&env).await;
    let client = reqwest::Client::new();

    let traversal = client
        .post(url(&addr, "/api/jobs"))
        .json(&json!({ "source_filename": "../../etc/passwd" }))
        .send()
        .await
        .unwrap();
    assert_eq!(traversal.status(), reqwest::StatusCode::BAD_REQUEST);

    let bad_id = client
        .post(url(&addr, "/api/jobs"))
        .json(&json!({ "job_id": "a/b", "source_filename": SOURCE }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_id.status(), reqwest::StatusCode::BAD_REQUEST);

    let missing = client
        .post(url(&addr, "/api/jobs"))
        .json(&json!({ "source_filename": "nope.mp4" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    let unknown = client
        .get(url(&addr, "/api/jobs/never-seen"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);

    let stop_unknown = client
        .post(url(&addr, "/api/jobs/never-seen/stop"))
        .send()
        .await
        .unwrap();
    assert_eq!(stop_unknown.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn test_conflict_and_stop() {
    let env = TestEnv::new();
    env.hang("360p");
    let (orch, addr) = with_server(&env).await;
    let client = reqwest::Client::new();
    let body = json!({
        "job_id": "long-job",
        "source_filename": SOURCE,
        "renditions": ["360p"]
    });

    let first = client
        .post(url(&addr, "/api/jobs"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::ACCEPTED);

    let job_id = JobId::new("long-job").unwrap();
    wait_for(&orch, &job_id, |s| {
        s.rendition("360p").map(|r| r.state) == Some(RenditionState::Running)
    })
    .await;

    let second = client
        .post(url(&addr, "/api/jobs"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::CONFLICT);

    let stop = client
        .post(url(&addr, "/api/jobs/long-job/stop"))
        .send()
        .await
        .unwrap();
    assert_eq!(stop.status(), reqwest::StatusCode::ACCEPTED);

    let status = wait_for(&orch, &job_id, |s| s.overall_state == OverallState::Stopped).await;
    assert_eq!(
        status.rendition("360p").unwrap().state,
        RenditionState::Stopped
    );
    assert!(status.master_manifest_name.is_none());
}
