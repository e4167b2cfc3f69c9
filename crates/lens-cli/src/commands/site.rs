use crate::cli::GlobalFlags;
use crate::cli::subcommands::SiteCommands;
use crate::context::AppContext;
use crate::output::output;

/// Handle `slens site`.
pub async fn handle(
    action: &SiteCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        SiteCommands::Add {
            tenant,
            url,
            name,
            tier,
        } => {
            let site = ctx
                .orchestrator
                .register_site(tenant, url, name.as_deref(), *tier)
                .await?;
            output(&site, flags.format)
        }
        SiteCommands::Get { id } => output(&ctx.orchestrator.site(id).await?, flags.format),
        SiteCommands::List { tenant } => output(
            &ctx.orchestrator.sites(tenant.as_deref()).await?,
            flags.format,
        ),
    }
}
