use lens_core::entities::AuditRequest;
use lens_core::enums::RequestStatus;
use lens_core::responses::{AuditAccepted, AuditStatusResponse};
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::AuditCommands;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct AuditRunResponse {
    request: AuditStatusResponse,
    report: Option<lens_core::entities::Report>,
}

/// Handle `slens audit`.
///
/// The aggregation runs inside this process, so `run` always lets it finish
/// before exiting; `--wait` only changes what is printed.
pub async fn handle(
    action: &AuditCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        AuditCommands::Run {
            site,
            source,
            deadline_secs,
            wait,
        } => {
            let request = ctx
                .orchestrator
                .submit(site, source.clone(), *deadline_secs)
                .await?;
            if !wait {
                output(&AuditAccepted::from(&request), flags.format)?;
            }
            let finished = ctx.orchestrator.wait(&request.id, None).await?;
            log_outcome(&finished);
            if *wait {
                let report = match finished.report_version {
                    Some(version) => Some(ctx.orchestrator.report(site, Some(version)).await?),
                    None => None,
                };
                output(
                    &AuditRunResponse {
                        request: finished.into(),
                        report,
                    },
                    flags.format,
                )?;
            }
            Ok(())
        }
        AuditCommands::Status { id } => {
            let request = ctx.orchestrator.status(id).await?;
            output(&AuditStatusResponse::from(request), flags.format)
        }
    }
}

fn log_outcome(request: &AuditRequest) {
    match request.status {
        RequestStatus::Complete => {
            tracing::info!(request_id = %request.id, "audit complete");
        }
        status => tracing::warn!(
            request_id = %request.id,
            %status,
            error = request.error.as_deref().unwrap_or(""),
            "audit did not complete cleanly"
        ),
    }
}
