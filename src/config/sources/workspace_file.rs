//! Workspace config files under `<workspace>/config/`.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Selects the environment overlay, `config/{name}.toml`.
pub const ENV_NAME_VAR: &str = "NOTEBOOK_REFRESH_ENV";
const DEFAULT_ENV_NAME: &str = "development";

/// Base file first, then the environment overlay; later files win.
pub fn workspace_config_paths(workspace_root: &Path) -> [PathBuf; 2] {
    let config_dir = workspace_root.join("config");
    let env_name = std::env::var(ENV_NAME_VAR)
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENV_NAME.to_string());
    [
        config_dir.join("config.toml"),
        config_dir.join(format!("{}.toml", env_name.trim())),
    ]
}

/// Layer every workspace config file that exists onto the builder.
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    for path in workspace_config_paths(workspace_root) {
        if path.is_file() {
            debug!(config_path = %path.display(), "Adding workspace configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }
    }
    Ok(builder)
}
