use clap::Subcommand;

/// Report commands.
#[derive(Clone, Debug, Subcommand)]
pub enum ReportCommands {
    /// Latest report for a site, or a specific version.
    Get {
        site: String,
        #[arg(long)]
        version: Option<i64>,
    },
    /// Reports for a site, newest first.
    History {
        site: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        before_version: Option<i64>,
    },
}
