//! # lens-config
//!
//! Layered configuration loading for Sitelens using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`SITELENS_*` prefix, `__` as separator)
//! 2. Project-level `sitelens.toml` (or an explicit `--config` file)
//! 3. User-level `~/.config/sitelens/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `SITELENS_SERPBEAR__API_KEY` -> `serpbear.api_key`,
//! `SITELENS_AGGREGATOR__MAX_ATTEMPTS` -> `aggregator.max_attempts`, etc.
//! The `__` (double underscore) separates nested config sections.
//!
//! # Usage
//!
//! ```no_run
//! use lens_config::LensConfig;
//!
//! let config = LensConfig::load_with_dotenv().expect("config");
//! if config.serpbear.is_configured() {
//!     println!("SerpBear: {}", config.serpbear.base_url);
//! }
//! ```

mod adapters;
mod aggregator;
mod database;
mod error;
mod server;

pub use adapters::{LighthouseConfig, LlmConfig, SerpBearConfig, TechnicalConfig};
pub use aggregator::{AggregatorConfig, ContentionPolicy};
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use server::ServerConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "SITELENS_";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LensConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub technical: TechnicalConfig,
    #[serde(default)]
    pub serpbear: SerpBearConfig,
    #[serde(default)]
    pub lighthouse: LighthouseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
}

impl LensConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy` -- use [`LensConfig::load_with_dotenv`] if you need `.env` file loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::figment(None))
    }

    /// Load configuration with an explicit project file in place of `./sitelens.toml`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the file does not exist, or any
    /// error [`LensConfig::load`] can return.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::InvalidValue {
                field: "config".to_string(),
                reason: format!("{} does not exist", path.display()),
            });
        }
        Self::extract(Self::figment(Some(path)))
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// See [`LensConfig::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the figment provider chain.
    ///
    /// `project_file` replaces the default `./sitelens.toml` layer.
    pub fn figment(project_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        // Layer 2: Project-local config
        let local_path = project_file.map_or_else(|| PathBuf::from("sitelens.toml"), Path::to_path_buf);
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Environment variables (highest priority)
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject values that would make aggregation impossible.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, reason: &str| {
            Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.aggregator.max_attempts == 0 {
            return invalid("aggregator.max_attempts", "must be at least 1");
        }
        if self.aggregator.deadline_secs == 0 {
            return invalid("aggregator.deadline_secs", "must be at least 1");
        }
        if self.aggregator.max_backoff_ms < self.aggregator.base_backoff_ms {
            return invalid(
                "aggregator.max_backoff_ms",
                "must not be smaller than base_backoff_ms",
            );
        }
        for (field, secs) in [
            ("technical.timeout_secs", self.technical.timeout_secs),
            ("serpbear.timeout_secs", self.serpbear.timeout_secs),
            ("lighthouse.timeout_secs", self.lighthouse.timeout_secs),
            ("llm.timeout_secs", self.llm.timeout_secs),
        ] {
            if secs == 0 {
                return invalid(field, "must be at least 1");
            }
        }
        Ok(())
    }

    /// Names of upstream sections that are not configured.
    pub fn unconfigured_sources(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.technical.is_configured() {
            missing.push("technical");
        }
        if !self.serpbear.is_configured() {
            missing.push("serpbear");
        }
        if !self.lighthouse.is_configured() {
            missing.push("lighthouse");
        }
        if !self.llm.is_configured() {
            missing.push("llm");
        }
        missing
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sitelens").join("config.toml"))
    }
}
