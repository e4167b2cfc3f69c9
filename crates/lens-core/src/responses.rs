//! Response and request bodies shared by the HTTP API and `slens` output.
//!
//! These structs define the JSON shape of `POST /audit`,
//! `GET /audit/{id}/status`, `POST /sites`, and the health endpoints.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::AuditRequest;
use crate::enums::{RequestStatus, SiteTier, SourceKind};

/// Body of `POST /audit`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RunAuditBody {
    pub site_id: String,
    pub sources: Vec<SourceKind>,
    /// Seconds from now after which the request is cancelled.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

/// Response from `POST /audit` and `slens audit run`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AuditAccepted {
    pub request_id: String,
    pub status: RequestStatus,
}

/// Response from `GET /audit/{id}/status` and `slens audit status`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AuditStatusResponse {
    pub request_id: String,
    pub site_id: String,
    pub status: RequestStatus,
    pub sources: Vec<SourceKind>,
    pub report_version: Option<i64>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&AuditRequest> for AuditAccepted {
    fn from(request: &AuditRequest) -> Self {
        Self {
            request_id: request.id.clone(),
            status: request.status,
        }
    }
}

impl From<AuditRequest> for AuditStatusResponse {
    fn from(request: AuditRequest) -> Self {
        Self {
            request_id: request.id,
            site_id: request.site_id,
            status: request.status,
            sources: request.sources,
            report_version: request.report_version,
            error: request.error,
            updated_at: request.updated_at,
        }
    }
}

/// Body of `POST /sites`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CreateSiteBody {
    pub tenant_id: String,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    pub tier: SiteTier,
}

/// Response from `GET /health` and `GET /health/db`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub database: Option<String>,
}
