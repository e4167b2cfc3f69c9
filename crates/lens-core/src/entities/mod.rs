//! Entity structs for all Sitelens domain objects.
//!
//! Each entity maps to a table in the libSQL database (see `lens-db`
//! migrations). All structs derive `Serialize`, `Deserialize`, and `JsonSchema`
//! for JSON roundtrip and schema validation.

mod payload;
mod report;
mod request;
mod site;
mod source_result;

pub use payload::{NormalizedPayload, PayloadItem};
pub use report::{HistoryRange, NewReport, Report};
pub use request::{AuditRequest, normalize_sources};
pub use site::{Site, SiteScores, parse_site_url, validate_site_url};
pub use source_result::SourceResult;
