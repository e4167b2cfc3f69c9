use anyhow::Context;
use lens_config::LensConfig;

/// Handle `slens serve`.
pub async fn handle(config: &LensConfig) -> anyhow::Result<()> {
    lens_server::serve(config)
        .await
        .context("sitelens api failed")
}
