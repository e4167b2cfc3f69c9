use std::sync::Arc;

use anyhow::Context;
use lens_adapters::AdapterSet;
use lens_audit::Orchestrator;
use lens_config::LensConfig;
use lens_db::service::LensService;

/// Shared resources for the one-shot commands.
pub struct AppContext {
    pub orchestrator: Orchestrator,
}

impl AppContext {
    /// Open the database and wire the adapters from `config`.
    ///
    /// Interrupted requests are left alone; a running `slens serve` may own
    /// them.
    pub async fn init(config: &LensConfig) -> anyhow::Result<Self> {
        let service = LensService::open(&config.database)
            .await
            .with_context(|| format!("failed to open database {}", config.database.path))?;
        let adapters = AdapterSet::from_config(config).context("failed to build HTTP client")?;
        let orchestrator = Orchestrator::new(Arc::new(service), adapters, &config.aggregator);
        Ok(Self { orchestrator })
    }
}
