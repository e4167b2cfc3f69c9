//! Site repository.
//!
//! Sites are tenant-owned and mutable apart from their id. Cached scores are
//! overwritten after each saved report.

use chrono::Utc;

use lens_core::entities::{Site, SiteScores};
use lens_core::enums::SiteTier;
use lens_core::ids::PREFIX_SITE;

use crate::error::DatabaseError;
use crate::helpers::{format_ts, get_opt_string, parse_datetime, parse_enum, parse_optional_datetime};
use crate::service::LensService;

const SITE_COLUMNS: &str = "id, tenant_id, url, name, tier, active, last_audit_at, last_audit_score, \
     performance_score, seo_score, accessibility_score, best_practices_score, created_at, updated_at";

fn row_to_site(row: &libsql::Row) -> Result<Site, DatabaseError> {
    let tier: String = row.get(4)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;
    Ok(Site {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        url: row.get(2)?,
        name: get_opt_string(row, 3)?,
        tier: parse_enum(&tier)?,
        active: row.get::<i64>(5)? != 0,
        scores: SiteScores {
            last_audit_at: parse_optional_datetime(get_opt_string(row, 6)?.as_deref())?,
            last_audit_score: row.get::<Option<f64>>(7)?,
            performance_score: row.get::<Option<f64>>(8)?,
            seo_score: row.get::<Option<f64>>(9)?,
            accessibility_score: row.get::<Option<f64>>(10)?,
            best_practices_score: row.get::<Option<f64>>(11)?,
        },
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

impl LensService {
    /// Register a new site. The URL is stored as given (trimmed).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the insert fails.
    pub async fn create_site(
        &self,
        tenant_id: &str,
        url: &str,
        name: Option<&str>,
        tier: SiteTier,
    ) -> Result<Site, DatabaseError> {
        let _guard = self.db().write_gate().await;
        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_SITE).await?;
        let url = url.trim();
        let now_text = format_ts(&now);

        self.db()
            .execute_with(
                "INSERT INTO sites (id, tenant_id, url, name, tier, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
                || {
                    libsql::params![
                        id.as_str(),
                        tenant_id,
                        url,
                        name,
                        tier.as_str(),
                        now_text.as_str()
                    ]
                },
            )
            .await?;

        tracing::info!(site_id = %id, tenant_id, url, "site registered");

        Ok(Site {
            id,
            tenant_id: tenant_id.to_string(),
            url: url.to_string(),
            name: name.map(String::from),
            tier,
            active: true,
            scores: SiteScores::default(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch a site by id.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if the site does not exist.
    pub async fn get_site(&self, id: &str) -> Result<Site, DatabaseError> {
        let _guard = self.db().read_gate().await;
        self.load_site(id).await
    }

    pub(crate) async fn load_site(&self, id: &str) -> Result<Site, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = ?1"),
                || [id],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found("site", id))?;
        row_to_site(&row)
    }

    /// List sites, optionally restricted to one tenant, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_sites(&self, tenant_id: Option<&str>) -> Result<Vec<Site>, DatabaseError> {
        let _guard = self.db().read_gate().await;
        let mut rows = match tenant_id {
            Some(tenant) => {
                self.db()
                    .query_with(
                        &format!(
                            "SELECT {SITE_COLUMNS} FROM sites WHERE tenant_id = ?1 ORDER BY created_at, id"
                        ),
                        || [tenant],
                    )
                    .await?
            }
            None => {
                self.db()
                    .query_with(
                        &format!("SELECT {SITE_COLUMNS} FROM sites ORDER BY created_at, id"),
                        || (),
                    )
                    .await?
            }
        };

        let mut sites = Vec::new();
        while let Some(row) = rows.next().await? {
            sites.push(row_to_site(&row)?);
        }
        Ok(sites)
    }

    /// Overwrite the cached scores of a site.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if the site does not exist.
    pub async fn update_site_scores(
        &self,
        id: &str,
        scores: &SiteScores,
    ) -> Result<(), DatabaseError> {
        let _guard = self.db().write_gate().await;
        let now = format_ts(&Utc::now());
        let last_audit_at = scores.last_audit_at.as_ref().map(format_ts);

        let changed = self
            .db()
            .execute_with(
                "UPDATE sites SET last_audit_at = ?1, last_audit_score = ?2, performance_score = ?3,
                 seo_score = ?4, accessibility_score = ?5, best_practices_score = ?6, updated_at = ?7
                 WHERE id = ?8",
                || {
                    libsql::params![
                        last_audit_at.as_deref(),
                        scores.last_audit_score,
                        scores.performance_score,
                        scores.seo_score,
                        scores.accessibility_score,
                        scores.best_practices_score,
                        now.as_str(),
                        id
                    ]
                },
            )
            .await?;

        if changed == 0 {
            return Err(DatabaseError::not_found("site", id));
        }
        Ok(())
    }

    /// Enable or disable audits for a site.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if the site does not exist.
    pub async fn set_site_active(&self, id: &str, active: bool) -> Result<Site, DatabaseError> {
        let _guard = self.db().write_gate().await;
        let now = format_ts(&Utc::now());

        let changed = self
            .db()
            .execute_with(
                "UPDATE sites SET active = ?1, updated_at = ?2 WHERE id = ?3",
                || libsql::params![i64::from(active), now.as_str(), id],
            )
            .await?;

        if changed == 0 {
            return Err(DatabaseError::not_found("site", id));
        }
        self.load_site(id).await
    }
}
