//! Adapters against fake upstream services on an ephemeral port.

use std::collections::HashMap;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use lens_adapters::lighthouse::LighthouseAdapter;
use lens_adapters::llm::LlmAdapter;
use lens_adapters::serpbear::SerpBearAdapter;
use lens_adapters::technical::TechnicalAdapter;
use lens_adapters::{FetchContext, SourceAdapter, http_client};
use lens_config::{LighthouseConfig, LlmConfig, SerpBearConfig, TechnicalConfig};
use lens_core::entities::{Site, SiteScores};
use lens_core::enums::{ErrorKind, SiteTier, SourceStatus};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn site() -> Site {
    Site {
        id: "sit-0000beef".into(),
        tenant_id: "acme".into(),
        url: "https://acme.example".into(),
        name: Some("Acme".into()),
        tier: SiteTier::Pro,
        active: true,
        scores: SiteScores::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn ctx(max_keywords: Option<usize>) -> FetchContext {
    FetchContext {
        request_id: "aud-00000001".into(),
        attempt: 1,
        max_keywords,
    }
}

#[tokio::test]
async fn technical_crawl_success() {
    let router = Router::new().route(
        "/crawl",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["url"], "https://acme.example");
            assert_eq!(body["max_pages"], 5);
            Json(json!({
                "pages_crawled": 5,
                "checks": [
                    {"id": "title", "category": "content", "passed": true, "severity": "major", "message": "ok"},
                    {"id": "canonical", "category": "indexing", "passed": false, "severity": "minor", "message": "missing"}
                ]
            }))
        }),
    );
    let base = spawn(router).await;
    let adapter = TechnicalAdapter::new(
        http_client().unwrap(),
        TechnicalConfig {
            base_url: base,
            max_pages: 5,
            ..Default::default()
        },
    );

    let result = adapter.fetch(&site(), &ctx(None)).await;
    assert_eq!(result.status, SourceStatus::Success);
    assert_eq!(result.payload.score, Some(50.0));
    assert_eq!(result.payload.items.len(), 1);
}

#[tokio::test]
async fn technical_server_error_is_http_error() {
    let router = Router::new().route(
        "/crawl",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
    );
    let base = spawn(router).await;
    let adapter = TechnicalAdapter::new(
        http_client().unwrap(),
        TechnicalConfig {
            base_url: base,
            ..Default::default()
        },
    );

    let result = adapter.fetch(&site(), &ctx(None)).await;
    assert_eq!(result.status, SourceStatus::Failed);
    assert_eq!(result.error_kind, Some(ErrorKind::AdapterHttpError));
    assert!(result.error.unwrap().contains("upstream down"));
}

#[tokio::test]
async fn technical_slow_upstream_times_out() {
    let router = Router::new().route(
        "/crawl",
        post(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Json(json!({"pages_crawled": 1, "checks": []}))
        }),
    );
    let base = spawn(router).await;
    let adapter = TechnicalAdapter::new(
        http_client().unwrap(),
        TechnicalConfig {
            base_url: base,
            timeout_secs: 1,
            ..Default::default()
        },
    );

    let result = adapter.fetch(&site(), &ctx(None)).await;
    assert_eq!(result.error_kind, Some(ErrorKind::AdapterTimeout));
    assert!(result.elapsed_ms >= 1000);
}

#[tokio::test]
async fn unconfigured_adapter_does_not_call_out() {
    let adapter = TechnicalAdapter::new(http_client().unwrap(), TechnicalConfig::default());
    let result = adapter.fetch(&site(), &ctx(None)).await;
    assert_eq!(result.error_kind, Some(ErrorKind::NotConfigured));
    assert!(!result.is_retryable());
}

#[tokio::test]
async fn serpbear_sends_domain_and_bearer() {
    let router = Router::new().route(
        "/api/keywords",
        get(
            |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| async move {
                assert_eq!(query.get("domain").map(String::as_str), Some("acme.example"));
                assert_eq!(
                    headers.get("authorization").and_then(|v| v.to_str().ok()),
                    Some("Bearer serp-key")
                );
                let keywords: Vec<Value> = (1..=10)
                    .map(|i| json!({"keyword": format!("kw {i}"), "position": i * 3, "device": "desktop", "country": "US"}))
                    .collect();
                Json(json!({ "keywords": keywords }))
            },
        ),
    );
    let base = spawn(router).await;
    let adapter = SerpBearAdapter::new(
        http_client().unwrap(),
        SerpBearConfig {
            base_url: base,
            api_key: "serp-key".into(),
            ..Default::default()
        },
    );

    let result = adapter.fetch(&site(), &ctx(Some(500))).await;
    assert_eq!(result.status, SourceStatus::Success);
    assert_eq!(result.payload.metric("keywords_tracked"), Some(10.0));
    assert_eq!(result.payload.metric("top10"), Some(3.0));
    assert_eq!(result.payload.score, Some(30.0));
}

#[tokio::test]
async fn serpbear_rate_limit() {
    let router = Router::new().route(
        "/api/keywords",
        get(|| async { (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "7")], "") }),
    );
    let base = spawn(router).await;
    let adapter = SerpBearAdapter::new(
        http_client().unwrap(),
        SerpBearConfig {
            base_url: base,
            api_key: "k".into(),
            ..Default::default()
        },
    );

    let result = adapter.fetch(&site(), &ctx(None)).await;
    assert_eq!(result.error_kind, Some(ErrorKind::RateLimited));
    assert!(result.is_retryable());
}

fn lighthouse_router(run_url: &'static str) -> Router {
    Router::new()
        .route(
            "/v1/projects/{project}/builds",
            get(|Path(project): Path<String>| async move {
                assert_eq!(project, "proj-1");
                Json(json!([{"id": "build-9", "projectId": "proj-1", "branch": "main"}]))
            }),
        )
        .route(
            "/v1/projects/{project}/builds/{build}/runs",
            get(move |Path((_, build)): Path<(String, String)>| async move {
                assert_eq!(build, "build-9");
                let lhr = json!({
                    "categories": {
                        "performance": {"score": 0.64},
                        "seo": {"score": 0.9},
                        "accessibility": {"score": 0.81},
                        "best-practices": {"score": 0.75}
                    },
                    "audits": {"speed-index": {"numericValue": 4200.7}}
                });
                Json(json!([{"id": "run-1", "url": run_url, "representative": true, "lhr": lhr.to_string()}]))
            }),
        )
}

#[tokio::test]
async fn lighthouse_latest_representative_run() {
    let base = spawn(lighthouse_router("https://acme.example/")).await;
    let adapter = LighthouseAdapter::new(
        http_client().unwrap(),
        LighthouseConfig {
            base_url: base,
            project_id: "proj-1".into(),
            ..Default::default()
        },
    );

    let result = adapter.fetch(&site(), &ctx(None)).await;
    assert_eq!(result.status, SourceStatus::Success);
    assert_eq!(result.payload.score, Some(64.0));
    assert_eq!(result.payload.metric("speed_index_ms"), Some(4201.0));
}

#[tokio::test]
async fn lighthouse_without_run_for_site_is_empty_result() {
    let base = spawn(lighthouse_router("https://someone-else.example/")).await;
    let adapter = LighthouseAdapter::new(
        http_client().unwrap(),
        LighthouseConfig {
            base_url: base,
            project_id: "proj-1".into(),
            ..Default::default()
        },
    );

    let result = adapter.fetch(&site(), &ctx(None)).await;
    assert_eq!(result.error_kind, Some(ErrorKind::EmptyResult));
    assert!(!result.is_retryable());
}

#[tokio::test]
async fn llm_messages_call() {
    let router = Router::new().route(
        "/v1/messages",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(
                headers.get("x-api-key").and_then(|v| v.to_str().ok()),
                Some("llm-key")
            );
            assert_eq!(body["model"], "test-model");
            assert!(
                body["messages"][0]["content"]
                    .as_str()
                    .unwrap()
                    .contains("https://acme.example")
            );
            Json(json!({
                "content": [{"type": "text", "text": "SCORE: 64\nDecent.\n- Add internal links"}],
                "stop_reason": "end_turn"
            }))
        }),
    );
    let base = spawn(router).await;
    let adapter = LlmAdapter::new(
        http_client().unwrap(),
        LlmConfig {
            base_url: base,
            api_key: "llm-key".into(),
            model: "test-model".into(),
            ..Default::default()
        },
    );

    let result = adapter.fetch(&site(), &ctx(None)).await;
    assert_eq!(result.status, SourceStatus::Success);
    assert_eq!(result.payload.score, Some(64.0));
    assert_eq!(result.payload.items.len(), 1);
}

#[tokio::test]
async fn llm_malformed_body_is_parse_error() {
    let router = Router::new().route("/v1/messages", post(|| async { "not json" }));
    let base = spawn(router).await;
    let adapter = LlmAdapter::new(
        http_client().unwrap(),
        LlmConfig {
            base_url: base,
            api_key: "llm-key".into(),
            ..Default::default()
        },
    );

    let result = adapter.fetch(&site(), &ctx(None)).await;
    assert_eq!(result.error_kind, Some(ErrorKind::Parse));
}
