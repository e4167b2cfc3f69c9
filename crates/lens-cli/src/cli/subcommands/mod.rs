mod audit;
mod report;
mod site;

pub use audit::AuditCommands;
pub use report::ReportCommands;
pub use site::SiteCommands;
