//! Scripted adapters and an in-memory orchestrator.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lens_adapters::{AdapterSet, FetchContext, SourceAdapter};
use lens_audit::Orchestrator;
use lens_config::{AggregatorConfig, ContentionPolicy};
use lens_core::entities::{NormalizedPayload, Site, SourceResult};
use lens_core::enums::{ErrorKind, RequestStatus, SiteTier, SourceKind};
use lens_db::service::LensService;

/// One scripted adapter answer.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Ok(f64),
    Fail(ErrorKind),
    Slow(Duration, f64),
}

pub struct FakeAdapter {
    kind: SourceKind,
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    pub calls: AtomicU32,
    active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl FakeAdapter {
    pub fn new(kind: SourceKind, fallback: Step) -> Arc<Self> {
        Self::scripted(kind, Vec::new(), fallback)
    }

    pub fn scripted(kind: SourceKind, script: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            kind,
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicU32::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn scored(&self, score: f64) -> SourceResult {
        SourceResult::success(
            self.kind,
            NormalizedPayload {
                score: Some(score),
                ..Default::default()
            }
            .with_metric("keywords_tracked", 10.0),
        )
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SourceAdapter for FakeAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, _site: &Site, _ctx: &FetchContext) -> SourceResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveGuard(&self.active);

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        match step {
            Step::Ok(score) => self.scored(score),
            Step::Fail(kind) => SourceResult::failed(self.kind, kind, format!("scripted {kind}")),
            Step::Slow(delay, score) => {
                tokio::time::sleep(delay).await;
                self.scored(score)
            }
        }
    }
}

pub fn config(contention: ContentionPolicy) -> AggregatorConfig {
    AggregatorConfig {
        max_attempts: 2,
        base_backoff_ms: 10,
        max_backoff_ms: 50,
        deadline_secs: 30,
        contention,
    }
}

pub fn adapters(fakes: &[Arc<FakeAdapter>]) -> AdapterSet {
    let mut set = AdapterSet::new();
    for fake in fakes {
        set.insert(Arc::clone(fake) as Arc<dyn SourceAdapter>);
    }
    set
}

pub async fn orchestrator(fakes: &[Arc<FakeAdapter>], config: &AggregatorConfig) -> Orchestrator {
    let db = Arc::new(LensService::new_local(":memory:").await.unwrap());
    Orchestrator::new(db, adapters(fakes), config)
}

pub async fn site(orch: &Orchestrator, tier: SiteTier) -> Site {
    orch.register_site("acme", "https://acme.example", Some("Acme"), tier)
        .await
        .unwrap()
}

pub const WAIT: Option<Duration> = Some(Duration::from_secs(10));

/// Poll until the request leaves `queued`.
pub async fn wait_until_running(orch: &Orchestrator, request_id: &str) {
    for _ in 0..200 {
        if orch.status(request_id).await.unwrap().status == RequestStatus::Running {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("request {request_id} never started running");
}
