use clap::Subcommand;
use lens_core::enums::SiteTier;

/// Site commands.
#[derive(Clone, Debug, Subcommand)]
pub enum SiteCommands {
    /// Register a site.
    Add {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        name: Option<String>,
        /// demo, starter, pro, enterprise, agency, internal
        #[arg(long, default_value = "starter")]
        tier: SiteTier,
    },
    /// Get a site by ID.
    Get { id: String },
    /// List sites.
    List {
        #[arg(long)]
        tenant: Option<String>,
    },
}
