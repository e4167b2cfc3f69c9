//! Audit request repository.
//!
//! Tracks the lifecycle of each audit: `queued → running → terminal`. Status
//! changes are validated against `RequestStatus::allowed_next_states`.

use chrono::{DateTime, Utc};

use lens_core::entities::AuditRequest;
use lens_core::enums::{RequestStatus, SourceKind};
use lens_core::ids::PREFIX_AUDIT_REQUEST;

use crate::error::DatabaseError;
use crate::helpers::{
    format_ts, get_opt_string, parse_datetime, parse_enum, parse_json, parse_optional_datetime,
    to_json,
};
use crate::service::LensService;

const REQUEST_COLUMNS: &str =
    "id, site_id, sources, status, deadline, report_version, error, created_at, updated_at";

fn row_to_request(row: &libsql::Row) -> Result<AuditRequest, DatabaseError> {
    let sources: String = row.get(2)?;
    let status: String = row.get(3)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(AuditRequest {
        id: row.get(0)?,
        site_id: row.get(1)?,
        sources: parse_json(&sources)?,
        status: parse_enum(&status)?,
        deadline: parse_optional_datetime(get_opt_string(row, 4)?.as_deref())?,
        report_version: row.get::<Option<i64>>(5)?,
        error: get_opt_string(row, 6)?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

/// Fields written alongside a status change.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub report_version: Option<i64>,
    pub error: Option<String>,
}

impl LensService {
    /// Record a new audit request in `queued` state.
    ///
    /// `sources` must already be normalized (sorted, deduplicated, non-empty).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the site does not exist or the insert fails.
    pub async fn create_request(
        &self,
        site_id: &str,
        sources: &[SourceKind],
        deadline: Option<DateTime<Utc>>,
    ) -> Result<AuditRequest, DatabaseError> {
        let _guard = self.db().write_gate().await;
        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_AUDIT_REQUEST).await?;
        let sources_json = to_json(&sources)?;
        let deadline_text = deadline.as_ref().map(format_ts);
        let now_text = format_ts(&now);

        self.db()
            .execute_with(
                "INSERT INTO audit_requests (id, site_id, sources, status, deadline, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'queued', ?4, ?5, ?5)",
                || {
                    libsql::params![
                        id.as_str(),
                        site_id,
                        sources_json.as_str(),
                        deadline_text.as_deref(),
                        now_text.as_str()
                    ]
                },
            )
            .await?;

        Ok(AuditRequest {
            id,
            site_id: site_id.to_string(),
            sources: sources.to_vec(),
            status: RequestStatus::Queued,
            deadline,
            report_version: None,
            error: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch an audit request by id.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if the request does not exist.
    pub async fn get_request(&self, id: &str) -> Result<AuditRequest, DatabaseError> {
        let _guard = self.db().read_gate().await;
        self.load_request(id).await
    }

    async fn load_request(&self, id: &str) -> Result<AuditRequest, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!("SELECT {REQUEST_COLUMNS} FROM audit_requests WHERE id = ?1"),
                || [id],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found("audit request", id))?;
        row_to_request(&row)
    }

    /// Move a request to `to`, validating the transition.
    ///
    /// `update` fields that are `None` leave the stored values untouched.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidTransition` if the state machine forbids
    /// the change, or `DatabaseError::NotFound` if the request does not exist.
    pub async fn update_request_status(
        &self,
        id: &str,
        to: RequestStatus,
        update: StatusUpdate,
    ) -> Result<AuditRequest, DatabaseError> {
        let _guard = self.db().write_gate().await;
        let current = self.load_request(id).await?;
        if !current.status.can_transition_to(to) {
            return Err(DatabaseError::InvalidTransition {
                id: id.to_string(),
                from: current.status.to_string(),
                to: to.to_string(),
            });
        }

        let now = Utc::now();
        let now_text = format_ts(&now);
        self.db()
            .execute_with(
                "UPDATE audit_requests
                 SET status = ?1, report_version = COALESCE(?2, report_version),
                     error = COALESCE(?3, error), updated_at = ?4
                 WHERE id = ?5",
                || {
                    libsql::params![
                        to.as_str(),
                        update.report_version,
                        update.error.as_deref(),
                        now_text.as_str(),
                        id
                    ]
                },
            )
            .await?;

        tracing::debug!(request_id = id, from = %current.status, to = %to, "audit request status changed");

        Ok(AuditRequest {
            status: to,
            report_version: update.report_version.or(current.report_version),
            error: update.error.or(current.error),
            updated_at: now,
            ..current
        })
    }

    /// Count audit requests created for a site at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_requests_since(
        &self,
        site_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, DatabaseError> {
        let _guard = self.db().read_gate().await;
        let since = format_ts(&since);
        let mut rows = self
            .db()
            .query_with(
                "SELECT COUNT(*) FROM audit_requests WHERE site_id = ?1 AND created_at >= ?2",
                || libsql::params![site_id, since.as_str()],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        crate::helpers::get_u32(&row, 0)
    }

    /// The oldest queued or running request for a site, if any.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn active_request_for_site(
        &self,
        site_id: &str,
    ) -> Result<Option<AuditRequest>, DatabaseError> {
        let _guard = self.db().read_gate().await;
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {REQUEST_COLUMNS} FROM audit_requests
                     WHERE site_id = ?1 AND status IN ('queued', 'running')
                     ORDER BY created_at, id LIMIT 1"
                ),
                || [site_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_request(&row)?)),
            None => Ok(None),
        }
    }

    /// Fail every request left queued or running by a previous process.
    ///
    /// Called once at startup, before any aggregation is spawned. Returns the
    /// number of requests changed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the update fails.
    pub async fn fail_interrupted_requests(&self) -> Result<u64, DatabaseError> {
        let _guard = self.db().write_gate().await;
        let now = format_ts(&Utc::now());
        let changed = self
            .db()
            .execute_with(
                "UPDATE audit_requests
                 SET status = 'failed', error = 'interrupted by restart', updated_at = ?1
                 WHERE status IN ('queued', 'running')",
                || [now.as_str()],
            )
            .await?;
        if changed > 0 {
            tracing::warn!(count = changed, "marked interrupted audit requests as failed");
        }
        Ok(changed)
    }
}
