//! HTTP API tests against a live router on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lens_adapters::{AdapterSet, FetchContext, SourceAdapter};
use lens_audit::Orchestrator;
use lens_config::{AggregatorConfig, ContentionPolicy, ServerConfig};
use lens_core::entities::{NormalizedPayload, Site, SourceResult};
use lens_core::enums::SourceKind;
use lens_db::service::LensService;
use lens_server::{AppState, build_app};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{Value, json};

const KEY: &str = "test-key";

/// Answers after `delay` with a fixed score.
struct DelayedAdapter {
    kind: SourceKind,
    delay: Duration,
}

#[async_trait]
impl SourceAdapter for DelayedAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, _site: &Site, _ctx: &FetchContext) -> SourceResult {
        tokio::time::sleep(self.delay).await;
        SourceResult::success(
            self.kind,
            NormalizedPayload {
                score: Some(80.0),
                ..Default::default()
            },
        )
    }
}

struct TestApi {
    base: String,
    http: reqwest::Client,
}

impl TestApi {
    async fn start(delay: Duration, contention: ContentionPolicy, api_key: &str) -> Self {
        let db = Arc::new(LensService::new_local(":memory:").await.unwrap());
        let mut adapters = AdapterSet::new();
        for kind in SourceKind::ALL {
            adapters.insert(Arc::new(DelayedAdapter { kind, delay }));
        }
        let config = AggregatorConfig {
            base_backoff_ms: 10,
            max_backoff_ms: 50,
            contention,
            ..AggregatorConfig::default()
        };
        let orchestrator = Orchestrator::new(db, adapters, &config);
        let server = ServerConfig {
            api_key: api_key.to_string(),
            ..ServerConfig::default()
        };
        let app = build_app(AppState::new(orchestrator, server));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base: format!("http://{addr}"),
            http: reqwest::Client::new(),
        }
    }

    async fn quick() -> Self {
        Self::start(Duration::ZERO, ContentionPolicy::Queue, "").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.http.get(self.url(path)).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self.http.post(self.url(path)).json(&body).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.http.delete(self.url(path)).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn add_site(&self) -> String {
        let (status, site) = self
            .post(
                "/sites",
                json!({"tenant_id": "t1", "url": "https://example.com", "tier": "internal"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        site["id"].as_str().unwrap().to_string()
    }

    async fn submit(&self, site_id: &str, sources: &[&str]) -> (StatusCode, Value) {
        self.post("/audit", json!({"site_id": site_id, "sources": sources}))
            .await
    }

    async fn poll_until(&self, request_id: &str, wanted: &[&str]) -> Value {
        let path = format!("/audit/{request_id}/status");
        for _ in 0..200 {
            let (status, body) = self.get(&path).await;
            assert_eq!(status, StatusCode::OK);
            if wanted.contains(&body["status"].as_str().unwrap()) {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("request {request_id} never reached {wanted:?}");
    }
}

#[tokio::test]
async fn audit_round_trip() {
    let api = TestApi::quick().await;
    let site_id = api.add_site().await;

    let (status, accepted) = api.submit(&site_id, &["technical", "ranking"]).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["status"], "queued");
    let request_id = accepted["request_id"].as_str().unwrap();

    let done = api.poll_until(request_id, &["complete"]).await;
    assert_eq!(done["site_id"], site_id.as_str());
    assert_eq!(done["report_version"], 1);

    let (status, report) = api.get(&format!("/sites/{site_id}/report")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["version"], 1);
    assert_eq!(report["status"], "complete");
    assert_eq!(report["results"].as_array().unwrap().len(), 2);

    let (status, site) = api.get(&format!("/sites/{site_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(site["scores"]["last_audit_score"], report["overall_score"]);
}

#[tokio::test]
async fn history_pages_newest_first() {
    let api = TestApi::quick().await;
    let site_id = api.add_site().await;
    for _ in 0..3 {
        let (_, accepted) = api.submit(&site_id, &["technical"]).await;
        api.poll_until(accepted["request_id"].as_str().unwrap(), &["complete"])
            .await;
    }

    let (status, history) = api.get(&format!("/sites/{site_id}/history")).await;
    assert_eq!(status, StatusCode::OK);
    let versions: Vec<i64> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["version"].as_i64().unwrap())
        .collect();
    assert_eq!(versions, vec![3, 2, 1]);

    let (_, page) = api
        .get(&format!("/sites/{site_id}/history?limit=1&before_version=3"))
        .await;
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["version"], 2);

    let (status, v1) = api.get(&format!("/sites/{site_id}/report?version=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v1["version"], 1);
}

#[tokio::test]
async fn errors_carry_status_and_code() {
    let api = TestApi::quick().await;
    let site_id = api.add_site().await;

    let (status, body) = api.submit("sit-00000000", &["technical"]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = api.submit(&site_id, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation");

    let (status, body) = api.post("/audit", json!({"sources": ["technical"]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = api.get(&format!("/sites/{site_id}/report")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = api
        .get(&format!("/sites/{site_id}/report?version=latest"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = api.get("/audit/aud-00000000/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = api
        .post(
            "/sites",
            json!({"tenant_id": "t1", "url": "ftp://example.com", "tier": "pro"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation");
}

#[tokio::test]
async fn cancel_running_audit() {
    let api = TestApi::start(Duration::from_secs(30), ContentionPolicy::Queue, "").await;
    let site_id = api.add_site().await;
    let (_, accepted) = api.submit(&site_id, &["technical"]).await;
    let request_id = accepted["request_id"].as_str().unwrap();
    api.poll_until(request_id, &["running"]).await;

    let (status, body) = api.delete(&format!("/audit/{request_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request_id"], request_id);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = api.delete(&format!("/audit/{request_id}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "invalid_transition");
}

#[tokio::test]
async fn reject_policy_returns_conflict() {
    let api = TestApi::start(Duration::from_secs(30), ContentionPolicy::Reject, "").await;
    let site_id = api.add_site().await;
    let (status, accepted) = api.submit(&site_id, &["technical"]).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = api.submit(&site_id, &["technical"]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "concurrent_audit_in_progress");

    let request_id = accepted["request_id"].as_str().unwrap();
    let (status, _) = api.delete(&format!("/audit/{request_id}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn api_key_guards_everything_but_health() {
    let api = TestApi::start(Duration::ZERO, ContentionPolicy::Queue, KEY).await;

    let (status, body) = api.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (status, body) = api.get("/health/db").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
    let (status, body) = api.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "sitelens");

    let (status, body) = api.get("/sites/sit-00000000").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let resp = api
        .http
        .get(api.url("/sites/sit-00000000"))
        .header("X-API-Key", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = api
        .http
        .get(api.url("/sites/sit-00000000"))
        .header("X-API-Key", KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = api
        .http
        .post(api.url("/sites"))
        .bearer_auth(KEY)
        .json(&json!({"tenant_id": "t1", "url": "https://example.com", "tier": "pro"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
}
