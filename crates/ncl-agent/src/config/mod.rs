//! Configuration discovery for the `ncl` binary.
//! Uses `--config` if given, then the NCL_CONFIG env var, then ./ncl.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ncl_common::RunConfig;
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "NCL_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "ncl.toml";


/// Pick the config file path. `env` is the value of NCL_CONFIG, if set.
pub fn resolve_path(flag: Option<&Path>, env: Option<String>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| env.filter(|v| !v.trim().is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load the run configuration, falling back to defaults when the file
/// does not exist. A file that exists but fails to parse is an error.
pub fn load(flag: Option<&Path>) -> anyhow::Result<RunConfig> {
    let path = resolve_path(flag, std::env::var(CONFIG_ENV).ok());
    load_from(&path)
}

pub fn load_from(path: &Path) -> anyhow::Result<RunConfig> {
    if !path.exists() {
        warn!(
            "Config file not found: {} (using defaults). Set {} or pass --config.",
            path.display(),
            CONFIG_ENV
        );
        return Ok(RunConfig::default());
    }

    let config = RunConfig::from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config in {}", path.display()))?;

    info!(
        "Configuration loaded from {}. Model: {} ({})",
        path.display(),
        config.model.name,
        config.model.id
    );
    Ok(config)
}
