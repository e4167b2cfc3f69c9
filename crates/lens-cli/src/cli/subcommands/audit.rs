use clap::Subcommand;
use lens_core::enums::SourceKind;

/// Audit commands.
#[derive(Clone, Debug, Subcommand)]
pub enum AuditCommands {
    /// Run an audit in this process.
    Run {
        #[arg(long)]
        site: String,
        /// technical, ranking, performance, ai_insight (repeatable)
        #[arg(long = "source", required = true)]
        source: Vec<SourceKind>,
        #[arg(long)]
        deadline_secs: Option<u64>,
        /// Print the finished report instead of the accepted request.
        #[arg(long)]
        wait: bool,
    },
    /// Show the status of an audit request.
    Status { id: String },
}
