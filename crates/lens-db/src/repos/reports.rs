//! Report repository.
//!
//! Reports are append-only. `save_report` assigns the next per-site version
//! and writes the report with all its source results in one transaction.

use chrono::{DateTime, Utc};

use lens_core::entities::{HistoryRange, NewReport, Report, SourceResult};
use lens_core::ids::PREFIX_REPORT;

use crate::error::DatabaseError;
use crate::helpers::{
    format_ts, get_opt_string, get_u32, get_u64, parse_datetime, parse_enum, parse_json, to_json,
};
use crate::service::LensService;

const REPORT_COLUMNS: &str =
    "id, site_id, version, request_id, status, overall_score, note, created_at";

/// A report row before its source results are attached.
fn row_to_report(row: &libsql::Row) -> Result<Report, DatabaseError> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(7)?;
    Ok(Report {
        id: row.get(0)?,
        site_id: row.get(1)?,
        version: row.get(2)?,
        request_id: row.get(3)?,
        status: parse_enum(&status)?,
        overall_score: row.get::<Option<f64>>(5)?,
        note: get_opt_string(row, 6)?,
        results: Vec::new(),
        created_at: parse_datetime(&created_at)?,
    })
}

fn row_to_result(row: &libsql::Row) -> Result<SourceResult, DatabaseError> {
    let kind: String = row.get(0)?;
    let status: String = row.get(1)?;
    let error_kind = get_opt_string(row, 2)?;
    let fetched_at: String = row.get(5)?;
    let payload: String = row.get(7)?;
    Ok(SourceResult {
        kind: parse_enum(&kind)?,
        status: parse_enum(&status)?,
        error_kind: error_kind.as_deref().map(parse_enum).transpose()?,
        error: get_opt_string(row, 3)?,
        attempts: get_u32(row, 4)?,
        fetched_at: parse_datetime(&fetched_at)?,
        elapsed_ms: get_u64(row, 6)?,
        payload: parse_json(&payload)?,
    })
}

impl LensService {
    /// Persist a complete report under the next version for its site.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if the report lacks a result for
    /// a requested source, or `DatabaseError` if the transaction fails. On
    /// failure nothing is written.
    pub async fn save_report(&self, report: NewReport) -> Result<Report, DatabaseError> {
        report
            .check_complete()
            .map_err(|e| DatabaseError::InvalidState(e.to_string()))?;

        let _guard = self.db().write_gate().await;
        let id = self.db().generate_id(PREFIX_REPORT).await?;
        let now = Utc::now();

        let tx = self.db().conn().transaction().await?;
        match insert_report(&tx, &id, &report, &now).await {
            Ok(version) => {
                tx.commit().await?;
                tracing::info!(
                    site_id = %report.site_id,
                    request_id = %report.request_id,
                    version,
                    status = %report.status,
                    "report saved"
                );
                Ok(Report {
                    id,
                    site_id: report.site_id,
                    version,
                    request_id: report.request_id,
                    status: report.status,
                    overall_score: report.overall_score,
                    note: report.note,
                    results: report.results,
                    created_at: now,
                })
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(%rollback, "report transaction rollback failed");
                }
                Err(e)
            }
        }
    }

    /// The highest-versioned report for a site.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if the site has no reports.
    pub async fn latest_report(&self, site_id: &str) -> Result<Report, DatabaseError> {
        let _guard = self.db().read_gate().await;
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {REPORT_COLUMNS} FROM reports WHERE site_id = ?1 ORDER BY version DESC LIMIT 1"
                ),
                || [site_id],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found("report", site_id))?;
        let report = row_to_report(&row)?;
        self.attach_results(report).await
    }

    /// One specific report version.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if that version does not exist.
    pub async fn get_report(&self, site_id: &str, version: i64) -> Result<Report, DatabaseError> {
        let _guard = self.db().read_gate().await;
        let mut rows = self
            .db()
            .query_with(
                &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE site_id = ?1 AND version = ?2"),
                || libsql::params![site_id, version],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found("report", &format!("{site_id} v{version}")))?;
        let report = row_to_report(&row)?;
        self.attach_results(report).await
    }

    /// Reports for a site, newest first. An unknown site yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn report_history(
        &self,
        site_id: &str,
        range: HistoryRange,
    ) -> Result<Vec<Report>, DatabaseError> {
        let _guard = self.db().read_gate().await;
        let before = range.before_version.unwrap_or(i64::MAX);
        let limit = i64::from(range.limit);
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {REPORT_COLUMNS} FROM reports
                     WHERE site_id = ?1 AND version < ?2
                     ORDER BY version DESC LIMIT ?3"
                ),
                || libsql::params![site_id, before, limit],
            )
            .await?;

        let mut headers = Vec::new();
        while let Some(row) = rows.next().await? {
            headers.push(row_to_report(&row)?);
        }

        let mut reports = Vec::with_capacity(headers.len());
        for report in headers {
            reports.push(self.attach_results(report).await?);
        }
        Ok(reports)
    }

    /// Count reports saved for a site at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_reports_since(
        &self,
        site_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, DatabaseError> {
        let _guard = self.db().read_gate().await;
        let since = format_ts(&since);
        let mut rows = self
            .db()
            .query_with(
                "SELECT COUNT(*) FROM reports WHERE site_id = ?1 AND created_at >= ?2",
                || libsql::params![site_id, since.as_str()],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        get_u32(&row, 0)
    }

    async fn attach_results(&self, mut report: Report) -> Result<Report, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT kind, status, error_kind, error, attempts, fetched_at, elapsed_ms, payload
                 FROM source_results WHERE report_id = ?1",
                || [report.id.as_str()],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            report.results.push(row_to_result(&row)?);
        }
        report.results.sort_by_key(|r| r.kind);
        Ok(report)
    }
}

/// Insert the report row and its results inside `tx`. Returns the version.
async fn insert_report(
    tx: &libsql::Transaction,
    id: &str,
    report: &NewReport,
    now: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    let mut rows = tx
        .query(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM reports WHERE site_id = ?1",
            [report.site_id.as_str()],
        )
        .await?;
    let version: i64 = rows.next().await?.ok_or(DatabaseError::NoResult)?.get(0)?;
    drop(rows);

    let created_at = format_ts(now);
    tx.execute(
        "INSERT INTO reports (id, site_id, version, request_id, status, overall_score, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        libsql::params![
            id,
            report.site_id.as_str(),
            version,
            report.request_id.as_str(),
            report.status.as_str(),
            report.overall_score,
            report.note.as_deref(),
            created_at.as_str()
        ],
    )
    .await?;

    for result in &report.results {
        let elapsed_ms = i64::try_from(result.elapsed_ms).unwrap_or(i64::MAX);
        tx.execute(
            "INSERT INTO source_results
             (report_id, kind, status, error_kind, error, attempts, fetched_at, elapsed_ms, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            libsql::params![
                id,
                result.kind.as_str(),
                result.status.as_str(),
                result.error_kind.map(|k| k.as_str()),
                result.error.as_deref(),
                i64::from(result.attempts),
                format_ts(&result.fetched_at),
                elapsed_ms,
                to_json(&result.payload)?
            ],
        )
        .await?;
    }

    Ok(version)
}
