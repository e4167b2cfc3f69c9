use std::path::Path;

use anyhow::Context;
use lens_config::LensConfig;

use crate::cli::GlobalFlags;

/// Load `.env` from the working directory, then the layered config.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<LensConfig> {
    load_dotenv()?;

    match &flags.config {
        Some(path) => LensConfig::load_from(Path::new(path))
            .with_context(|| format!("failed to load config from {path}")),
        None => LensConfig::load().context("failed to load configuration"),
    }
}

fn load_dotenv() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let env_path = cwd.join(".env");
    if env_path.exists() {
        dotenvy::from_path(&env_path)
            .with_context(|| format!("failed to load dotenv file at {}", env_path.display()))?;
    }
    Ok(())
}
