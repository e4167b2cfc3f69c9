use lens_config::LensConfig;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(
    command: Commands,
    config: LensConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    if let Commands::Serve = command {
        return commands::serve::handle(&config).await;
    }

    let ctx = AppContext::init(&config).await?;
    match command {
        Commands::Site { action } => commands::site::handle(&action, &ctx, flags).await,
        Commands::Audit { action } => commands::audit::handle(&action, &ctx, flags).await,
        Commands::Report { action } => commands::report::handle(&action, &ctx, flags).await,
        Commands::Serve | Commands::Schema(_) => {
            unreachable!("serve/schema are pre-dispatched")
        }
    }
}
