use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use lens_core::entities::{HistoryRange, Report, Site};
use lens_core::responses::{
    AuditAccepted, AuditStatusResponse, CreateSiteBody, HealthResponse, RunAuditBody,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::ApiError;

const SERVICE: &str = "sitelens";

#[derive(Debug, Deserialize)]
pub(crate) struct ReportQuery {
    version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    limit: Option<u32>,
    before_version: Option<i64>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

pub(crate) async fn service_info() -> Json<Value> {
    Json(json!({
        "service": SERVICE,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /audit",
            "GET /audit/{request_id}/status",
            "DELETE /audit/{request_id}",
            "POST /sites",
            "GET /sites/{site_id}",
            "GET /sites/{site_id}/report",
            "GET /sites/{site_id}/history",
            "GET /health",
            "GET /health/db",
        ],
    }))
}

fn health_body(database: Option<String>) -> HealthResponse {
    HealthResponse {
        status: "ok".to_string(),
        service: SERVICE.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    }
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(health_body(None))
}

pub(crate) async fn health_db(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, ApiError> {
    match state.orchestrator.db().db().ping().await {
        Ok(()) => Ok(Json(health_body(Some("ok".to_string())))),
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            Err(ApiError::Unavailable("database is not reachable".to_string()))
        }
    }
}

pub(crate) async fn run_audit(
    State(state): State<AppState>,
    payload: Result<Json<RunAuditBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body(payload)?;
    let request = state
        .orchestrator
        .submit(&req.site_id, req.sources, req.deadline_secs)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(AuditAccepted::from(&request))))
}

pub(crate) async fn audit_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<AuditStatusResponse>, ApiError> {
    let request = state.orchestrator.status(&request_id).await?;
    Ok(Json(request.into()))
}

pub(crate) async fn cancel_audit(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<AuditStatusResponse>, ApiError> {
    let request = state.orchestrator.cancel(&request_id).await?;
    Ok(Json(request.into()))
}

pub(crate) async fn create_site(
    State(state): State<AppState>,
    payload: Result<Json<CreateSiteBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body(payload)?;
    let site = state
        .orchestrator
        .register_site(&req.tenant_id, &req.url, req.name.as_deref(), req.tier)
        .await?;
    Ok((StatusCode::CREATED, Json(site)))
}

pub(crate) async fn get_site(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> Result<Json<Site>, ApiError> {
    Ok(Json(state.orchestrator.site(&site_id).await?))
}

pub(crate) async fn site_report(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    params: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Json<Report>, ApiError> {
    let params = query(params)?;
    Ok(Json(state.orchestrator.report(&site_id, params.version).await?))
}

pub(crate) async fn site_history(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    params: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<Report>>, ApiError> {
    let params = query(params)?;
    let range = HistoryRange::new(params.before_version, params.limit);
    Ok(Json(state.orchestrator.history(&site_id, range).await?))
}
