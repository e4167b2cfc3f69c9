//! Service layer owning the database handle.
//!
//! `LensService` wraps `LensDb`. All repo methods are implemented as
//! `impl LensService` blocks in `repos/`.

use lens_config::DatabaseConfig;

use crate::LensDb;
use crate::error::DatabaseError;

/// Entry point for every persistence operation.
///
/// Public repo methods take the database gate themselves: the write side for
/// inserts, updates and transactions, the read side for queries.
pub struct LensService {
    db: LensDb,
}

impl LensService {
    /// Create a service over a local database (`":memory:"` for tests).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(db_path: &str) -> Result<Self, DatabaseError> {
        Ok(Self {
            db: LensDb::open_local(db_path).await?,
        })
    }

    /// Create a service from the `[database]` config section.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        Ok(Self {
            db: LensDb::open(config).await?,
        })
    }

    /// Create from an existing `LensDb`.
    #[must_use]
    pub const fn from_db(db: LensDb) -> Self {
        Self { db }
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &LensDb {
        &self.db
    }
}
