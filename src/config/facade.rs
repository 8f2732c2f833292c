//! Configuration loader facade: assembles sources in precedence order.

use std::path::Path;

use config::File;
use tracing::debug;

use super::merge::merge_policy;
use super::sources::{env_vars, global_file, workspace_file};
use super::RefreshConfig;
use crate::error::SchedulerError;

/// Loads [`RefreshConfig`] from defaults, files, and environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then global file, then workspace files, then environment.
    pub fn load(workspace_root: &Path) -> Result<RefreshConfig, SchedulerError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let config: RefreshConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Loaded layered configuration");
        Ok(env_vars::apply_env_overrides(config))
    }

    /// Defaults, then the given file only, then environment.
    pub fn load_from_file(path: &Path) -> Result<RefreshConfig, SchedulerError> {
        let config: RefreshConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        debug!(config_path = %path.display(), "Loaded configuration file");
        Ok(env_vars::apply_env_overrides(config))
    }
}
