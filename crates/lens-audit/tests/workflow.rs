//! End-to-end audit workflow against scripted adapters.

mod common;

use std::time::Duration;

use common::{FakeAdapter, Step, WAIT, config, orchestrator, site, wait_until_running};
use lens_audit::AuditError;
use lens_config::ContentionPolicy;
use lens_core::entities::HistoryRange;
use lens_core::enums::{ErrorKind, ReportStatus, RequestStatus, SiteTier, SourceKind, SourceStatus};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn technical_times_out_twice_ranking_succeeds() {
    let technical = FakeAdapter::new(SourceKind::Technical, Step::Fail(ErrorKind::AdapterTimeout));
    let ranking = FakeAdapter::new(SourceKind::Ranking, Step::Ok(40.0));
    let orch = orchestrator(&[technical.clone(), ranking.clone()], &config(ContentionPolicy::Queue)).await;
    let s1 = site(&orch, SiteTier::Pro).await;

    let request = orch
        .submit(&s1.id, vec![SourceKind::Ranking, SourceKind::Technical], None)
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Queued);
    assert_eq!(request.sources, vec![SourceKind::Technical, SourceKind::Ranking]);

    let done = orch.wait(&request.id, WAIT).await.unwrap();
    assert_eq!(done.status, RequestStatus::Partial);
    assert_eq!(done.report_version, Some(1));

    let report = orch.report(&s1.id, None).await.unwrap();
    assert_eq!(report.status, ReportStatus::Partial);
    assert_eq!(report.request_id, request.id);

    let tech = report.result(SourceKind::Technical).unwrap();
    assert_eq!(tech.status, SourceStatus::Failed);
    assert_eq!(tech.error_kind, Some(ErrorKind::AdapterTimeout));
    assert_eq!(tech.attempts, 2);
    assert_eq!(technical.calls(), 2);

    let rank = report.result(SourceKind::Ranking).unwrap();
    assert_eq!(rank.status, SourceStatus::Success);
    assert_eq!(rank.payload.metric("keywords_tracked"), Some(10.0));
    assert_eq!(rank.attempts, 1);
    assert_eq!(report.overall_score, Some(40.0));
}

#[tokio::test]
async fn retry_recovers_from_transient_failure() {
    let technical = FakeAdapter::scripted(
        SourceKind::Technical,
        vec![Step::Fail(ErrorKind::RateLimited)],
        Step::Ok(90.0),
    );
    let orch = orchestrator(&[technical.clone()], &config(ContentionPolicy::Queue)).await;
    let s = site(&orch, SiteTier::Pro).await;

    let request = orch.submit(&s.id, vec![SourceKind::Technical], None).await.unwrap();
    let done = orch.wait(&request.id, WAIT).await.unwrap();
    assert_eq!(done.status, RequestStatus::Complete);

    let report = orch.report(&s.id, Some(1)).await.unwrap();
    assert_eq!(report.result(SourceKind::Technical).unwrap().attempts, 2);
}

#[tokio::test]
async fn all_sources_failing_yields_failed_report() {
    let technical = FakeAdapter::new(SourceKind::Technical, Step::Fail(ErrorKind::AdapterHttpError));
    let performance = FakeAdapter::new(SourceKind::Performance, Step::Fail(ErrorKind::Parse));
    let orch = orchestrator(&[technical, performance.clone()], &config(ContentionPolicy::Queue)).await;
    let s = site(&orch, SiteTier::Pro).await;

    let request = orch
        .submit(&s.id, vec![SourceKind::Technical, SourceKind::Performance], None)
        .await
        .unwrap();
    let done = orch.wait(&request.id, WAIT).await.unwrap();
    assert_eq!(done.status, RequestStatus::Failed);

    let report = orch.report(&s.id, None).await.unwrap();
    assert_eq!(report.status, ReportStatus::Failed);
    assert_eq!(report.overall_score, None);
    assert!(report.results.iter().all(|r| r.error_kind.is_some()));
    // Parse errors are not retried.
    assert_eq!(performance.calls(), 1);
}

#[tokio::test]
async fn missing_adapter_is_not_configured() {
    let technical = FakeAdapter::new(SourceKind::Technical, Step::Ok(70.0));
    let orch = orchestrator(&[technical], &config(ContentionPolicy::Queue)).await;
    let s = site(&orch, SiteTier::Pro).await;

    let request = orch
        .submit(&s.id, vec![SourceKind::Technical, SourceKind::AiInsight], None)
        .await
        .unwrap();
    orch.wait(&request.id, WAIT).await.unwrap();

    let report = orch.report(&s.id, None).await.unwrap();
    assert_eq!(report.status, ReportStatus::Partial);
    assert_eq!(
        report.result(SourceKind::AiInsight).unwrap().error_kind,
        Some(ErrorKind::NotConfigured)
    );
}

#[tokio::test]
async fn concurrent_requests_for_one_site_are_serialized() {
    let technical = FakeAdapter::new(
        SourceKind::Technical,
        Step::Slow(Duration::from_millis(100), 50.0),
    );
    let orch = orchestrator(&[technical.clone()], &config(ContentionPolicy::Queue)).await;
    let s = site(&orch, SiteTier::Internal).await;

    let (a, b) = tokio::join!(
        orch.submit(&s.id, vec![SourceKind::Technical], None),
        orch.submit(&s.id, vec![SourceKind::Technical], None),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    let a = orch.wait(&a.id, WAIT).await.unwrap();
    let b = orch.wait(&b.id, WAIT).await.unwrap();

    let mut versions = vec![a.report_version.unwrap(), b.report_version.unwrap()];
    versions.sort_unstable();
    assert_eq!(versions, vec![1, 2]);
    assert_eq!(technical.peak(), 1, "aggregations for one site overlapped");
    assert_eq!(orch.in_flight(), 0);
}

#[tokio::test]
async fn history_after_three_audits_is_newest_first() {
    let technical = FakeAdapter::new(SourceKind::Technical, Step::Ok(80.0));
    let orch = orchestrator(&[technical], &config(ContentionPolicy::Queue)).await;
    let s1 = site(&orch, SiteTier::Internal).await;

    for _ in 0..3 {
        let request = orch.submit(&s1.id, vec![SourceKind::Technical], None).await.unwrap();
        orch.wait(&request.id, WAIT).await.unwrap();
    }

    let history = orch.history(&s1.id, HistoryRange::default()).await.unwrap();
    let versions: Vec<i64> = history.iter().map(|r| r.version).collect();
    assert_eq!(versions, vec![3, 2, 1]);
}

#[tokio::test]
async fn site_scores_refresh_after_report() {
    let technical = FakeAdapter::new(SourceKind::Technical, Step::Ok(80.0));
    let orch = orchestrator(&[technical], &config(ContentionPolicy::Queue)).await;
    let s = site(&orch, SiteTier::Pro).await;

    let request = orch.submit(&s.id, vec![SourceKind::Technical], None).await.unwrap();
    orch.wait(&request.id, WAIT).await.unwrap();

    let refreshed = orch.site(&s.id).await.unwrap();
    assert_eq!(refreshed.scores.last_audit_score, Some(80.0));
    assert_eq!(refreshed.scores.seo_score, Some(80.0));
    assert!(refreshed.scores.last_audit_at.is_some());
}

#[tokio::test]
async fn cancel_running_request() {
    let technical = FakeAdapter::new(
        SourceKind::Technical,
        Step::Slow(Duration::from_secs(30), 50.0),
    );
    let orch = orchestrator(&[technical], &config(ContentionPolicy::Queue)).await;
    let s = site(&orch, SiteTier::Pro).await;

    let request = orch.submit(&s.id, vec![SourceKind::Technical], None).await.unwrap();
    wait_until_running(&orch, &request.id).await;

    let cancelled = orch.cancel(&request.id).await.unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
    assert_eq!(cancelled.report_version, Some(1));

    let report = orch.report(&s.id, Some(1)).await.unwrap();
    assert_eq!(report.status, ReportStatus::Failed);
    assert_eq!(report.note.as_deref(), Some("cancelled by caller"));
    assert_eq!(
        report.result(SourceKind::Technical).unwrap().error_kind,
        Some(ErrorKind::Cancelled)
    );

    let again = orch.cancel(&request.id).await.unwrap_err();
    assert!(matches!(again, AuditError::InvalidTransition { .. }));
}

#[tokio::test]
async fn cancel_after_collection_reports_completed_request() {
    let technical = FakeAdapter::new(
        SourceKind::Technical,
        Step::Slow(Duration::from_millis(50), 50.0),
    );
    let orch = orchestrator(&[technical], &config(ContentionPolicy::Queue)).await;
    let s = site(&orch, SiteTier::Pro).await;

    let request = orch.submit(&s.id, vec![SourceKind::Technical], None).await.unwrap();
    wait_until_running(&orch, &request.id).await;

    // Hold writes so the aggregation parks in save_report after collecting.
    let gate = orch.db().db().write_gate().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let canceller = {
        let orch = orch.clone();
        let id = request.id.clone();
        tokio::spawn(async move { orch.cancel(&id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(gate);

    let err = canceller.await.unwrap().unwrap_err();
    assert!(
        matches!(&err, AuditError::InvalidTransition { from, .. } if from == "complete"),
        "{err:?}"
    );
    let settled = orch.status(&request.id).await.unwrap();
    assert_eq!(settled.status, RequestStatus::Complete);
    assert_eq!(settled.report_version, Some(1));
}

#[tokio::test]
async fn cancel_queued_request_writes_no_report() {
    let technical = FakeAdapter::new(
        SourceKind::Technical,
        Step::Slow(Duration::from_millis(300), 50.0),
    );
    let orch = orchestrator(&[technical], &config(ContentionPolicy::Queue)).await;
    let s = site(&orch, SiteTier::Pro).await;

    let first = orch.submit(&s.id, vec![SourceKind::Technical], None).await.unwrap();
    wait_until_running(&orch, &first.id).await;
    let second = orch.submit(&s.id, vec![SourceKind::Technical], None).await.unwrap();

    let cancelled = orch.cancel(&second.id).await.unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
    assert_eq!(cancelled.report_version, None);

    let first = orch.wait(&first.id, WAIT).await.unwrap();
    assert_eq!(first.report_version, Some(1));
    let history = orch.history(&s.id, HistoryRange::default()).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn reject_policy_refuses_second_request() {
    let technical = FakeAdapter::new(
        SourceKind::Technical,
        Step::Slow(Duration::from_millis(300), 50.0),
    );
    let orch = orchestrator(&[technical], &config(ContentionPolicy::Reject)).await;
    let s = site(&orch, SiteTier::Pro).await;

    let first = orch.submit(&s.id, vec![SourceKind::Technical], None).await.unwrap();
    let err = orch
        .submit(&s.id, vec![SourceKind::Technical], None)
        .await
        .unwrap_err();
    match err {
        AuditError::ConcurrentAuditInProgress { request_id, .. } => assert_eq!(request_id, first.id),
        other => panic!("expected ConcurrentAuditInProgress, got {other:?}"),
    }

    let first = orch.wait(&first.id, WAIT).await.unwrap();
    assert_eq!(first.status, RequestStatus::Complete);
    orch.submit(&s.id, vec![SourceKind::Technical], None)
        .await
        .unwrap();
}

#[tokio::test]
async fn caller_deadline_cancels_pending_sources() {
    let technical = FakeAdapter::new(SourceKind::Technical, Step::Ok(90.0));
    let ranking = FakeAdapter::new(SourceKind::Ranking, Step::Slow(Duration::from_secs(30), 50.0));
    let orch = orchestrator(&[technical, ranking], &config(ContentionPolicy::Queue)).await;
    let s = site(&orch, SiteTier::Pro).await;

    let request = orch
        .submit(&s.id, vec![SourceKind::Technical, SourceKind::Ranking], Some(1))
        .await
        .unwrap();
    let done = orch.wait(&request.id, WAIT).await.unwrap();
    assert_eq!(done.status, RequestStatus::Cancelled);
    assert!(done.error.unwrap().contains("caller deadline"));

    let report = orch.report(&s.id, None).await.unwrap();
    assert_eq!(report.status, ReportStatus::Failed);
    assert_eq!(report.result(SourceKind::Technical).unwrap().status, SourceStatus::Success);
    assert_eq!(
        report.result(SourceKind::Ranking).unwrap().error_kind,
        Some(ErrorKind::Cancelled)
    );
}

#[tokio::test]
async fn global_deadline_times_out_pending_sources() {
    let technical = FakeAdapter::new(SourceKind::Technical, Step::Ok(90.0));
    let ranking = FakeAdapter::new(SourceKind::Ranking, Step::Slow(Duration::from_secs(30), 50.0));
    let mut cfg = config(ContentionPolicy::Queue);
    cfg.deadline_secs = 1;
    let orch = orchestrator(&[technical, ranking], &cfg).await;
    let s = site(&orch, SiteTier::Pro).await;

    let request = orch
        .submit(&s.id, vec![SourceKind::Technical, SourceKind::Ranking], None)
        .await
        .unwrap();
    let done = orch.wait(&request.id, WAIT).await.unwrap();
    assert_eq!(done.status, RequestStatus::Partial);

    let report = orch.report(&s.id, None).await.unwrap();
    assert_eq!(report.status, ReportStatus::Partial);
    assert_eq!(report.note.as_deref(), Some("aggregation deadline reached"));
    assert_eq!(
        report.result(SourceKind::Ranking).unwrap().error_kind,
        Some(ErrorKind::AdapterTimeout)
    );
}
