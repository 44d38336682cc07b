// Wizard configuration
//
// Layers, lowest to highest precedence:
// 1. Built-in defaults
// 2. TOML file (`--config=<path>`, else `./initial-setup.toml`, else `<config_dir>/initial-setup/config.toml`)
// 3. Environment: `INITIAL_SETUP_BASE_URL`, `INITIAL_SETUP_REQUEST_TIMEOUT_SECS`,
//    `INITIAL_SETUP_DEV_SEED__ENABLED`, ...

use crate::models::state::DevSeed;
use crate::utils::path_resolver::resolve_config_file;
use crate::utils::validation::validate_base_url;
use crate::wizard::form::FormValues;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8888";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const ENV_PREFIX: &str = "INITIAL_SETUP";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub dev_seed: DevSeedConfig,
}

/// Developer seed: example values to pre-fill the forms with. Honoured only in debug builds.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevSeedConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    #[serde(default)]
    pub source: BTreeMap<String, String>,
    #[serde(default)]
    pub target: BTreeMap<String, String>,
}

impl std::fmt::Debug for DevSeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevSeedConfig")
            .field("enabled", &self.enabled)
            .field("folder_path", &self.folder_path)
            .field("source", &FormValues::from(self.source.clone()))
            .field("target", &FormValues::from(self.target.clone()))
            .finish()
    }
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            dev_seed: DevSeedConfig::default(),
        }
    }
}

impl WizardConfig {
    /// Load from defaults, the config file, and the environment.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)?
            .set_default("dev_seed.enabled", false)?;

        match explicit_file {
            Some(path) => {
                info!("[PHASE: initialization] [STEP: config] Using config file {:?}", path);
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(path) = resolve_config_file() {
                    info!("[PHASE: initialization] [STEP: config] Using config file {:?}", path);
                    builder = builder.add_source(config::File::from(path).required(false));
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: WizardConfig = builder
            .build()
            .context("Failed to read wizard configuration")?
            .try_deserialize()
            .context("Wizard configuration has an invalid shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        validate_base_url(&self.base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The developer seed, if enabled and this is a debug build.
    pub fn active_seed(&self) -> Option<DevSeed> {
        self.seed_for_build(cfg!(debug_assertions))
    }

    fn seed_for_build(&self, debug_build: bool) -> Option<DevSeed> {
        if !self.dev_seed.enabled {
            return None;
        }
        if !debug_build {
            warn!("[PHASE: initialization] [STEP: dev_seed] dev_seed.enabled is ignored in release builds");
            return None;
        }
        Some(DevSeed {
            folder_path: self.dev_seed.folder_path.clone(),
            source: FormValues::from(self.dev_seed.source.clone()),
            target: FormValues::from(self.dev_seed.target.clone()),
        })
    }

    /// Commented TOML template with the default values.
    pub fn default_template() -> Result<String> {
        let body = toml::to_string_pretty(&WizardConfig::default())
            .context("Failed to render default configuration")?;
        Ok(format!(
            "# Initial setup wizard configuration\n\
             # Environment overrides: {prefix}_BASE_URL, {prefix}_REQUEST_TIMEOUT_SECS, {prefix}_DEV_SEED__ENABLED\n\
             \n{body}",
            prefix = ENV_PREFIX,
            body = body
        ))
    }
}
