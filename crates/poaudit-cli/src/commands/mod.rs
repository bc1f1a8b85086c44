pub mod ask;
pub mod batch;
pub mod config;
pub mod tools;

use std::path::Path;

use poaudit_core::PoauditConfig;
use tracing::debug;

/// Load the configuration from `--config`, else the default location, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<PoauditConfig> {
    if let Some(path) = config_path {
        return Ok(PoauditConfig::from_file(Path::new(path))?);
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        debug!("Using configuration from {}", default_path.display());
        Ok(PoauditConfig::from_file(&default_path)?)
    } else {
        Ok(PoauditConfig::default())
    }
}
