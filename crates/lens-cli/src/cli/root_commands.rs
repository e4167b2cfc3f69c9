use clap::{Args, Subcommand, ValueEnum};

use crate::cli::subcommands::{AuditCommands, ReportCommands, SiteCommands};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API.
    Serve,
    /// Register and inspect sites.
    Site {
        #[command(subcommand)]
        action: SiteCommands,
    },
    /// Submit audits and inspect their status.
    Audit {
        #[command(subcommand)]
        action: AuditCommands,
    },
    /// Read versioned reports.
    Report {
        #[command(subcommand)]
        action: ReportCommands,
    },
    /// Print the JSON Schema of a public type.
    Schema(SchemaArgs),
}

/// Types with a published JSON Schema.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SchemaType {
    Site,
    Report,
    AuditRequest,
}

#[derive(Clone, Debug, Args)]
pub struct SchemaArgs {
    #[arg(value_enum)]
    pub type_name: SchemaType,
}
