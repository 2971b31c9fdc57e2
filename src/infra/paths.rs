// src/infra/paths.rs — Config file location
//
// ORION_GATEWAY_HOME overrides everything. When unset, config lives in
// ~/.orion-gateway/.

use std::path::PathBuf;

const HOME_ENV: &str = "ORION_GATEWAY_HOME";

fn gateway_home() -> Option<PathBuf> {
    std::env::var_os(HOME_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Configuration directory: $ORION_GATEWAY_HOME/ or ~/.orion-gateway/
pub fn config_dir() -> PathBuf {
    if let Some(home) = gateway_home() {
        return home;
    }
    dirs_home().join(".orion-gateway")
}

/// Home directory, or the current directory if it can't be determined.
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
