use lens_core::entities::HistoryRange;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::ReportCommands;
use crate::context::AppContext;
use crate::output::output;

/// Handle `slens report`.
pub async fn handle(
    action: &ReportCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        ReportCommands::Get { site, version } => {
            output(&ctx.orchestrator.report(site, *version).await?, flags.format)
        }
        ReportCommands::History {
            site,
            limit,
            before_version,
        } => {
            let range = HistoryRange::new(*before_version, *limit);
            output(&ctx.orchestrator.history(site, range).await?, flags.format)
        }
    }
}
