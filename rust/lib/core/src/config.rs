use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::ServiceError;

/// Common startup configuration shared by the admin front ends.
///
/// Parsed from command-line arguments; values given here override the
/// ones found in the optional TOML config file.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Path to a TOML file with module settings.
    pub config_path: Option<PathBuf>,

    /// Base URL of the external test-results service.
    pub test_results_url: Option<String>,

    /// Override for the explorer's move-confirmation threshold.
    pub max_move_without_confirm: Option<usize>,
}

impl ServiceConfig {
    /// Parse configuration from command-line arguments.
    ///
    /// Supported flags:
    /// - `--config=PATH`
    /// - `--test-results-url=URL`
    /// - `--max-move-without-confirm=N`
    ///
    /// Unknown flags are ignored. A threshold that is not a number is
    /// rejected.
    pub fn from_args(args: &[String]) -> Result<Self, ServiceError> {
        let mut config = ServiceConfig::default();

        for arg in args {
            if let Some(val) = arg.strip_prefix("--config=") {
                config.config_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--test-results-url=") {
                config.test_results_url = Some(val.trim_end_matches('/').to_string());
            } else if let Some(val) = arg.strip_prefix("--max-move-without-confirm=") {
                let n = val.parse::<usize>().map_err(|_| {
                    ServiceError::Validation(format!(
                        "--max-move-without-confirm expects a number, got '{}'",
                        val
                    ))
                })?;
                config.max_move_without_confirm = Some(n);
            }
        }

        Ok(config)
    }

    /// Load the module section type `T` from the config file.
    ///
    /// Returns `T::default()` when no config path was given or the file
    /// does not exist.
    pub fn load_file<T: DeserializeOwned + Default>(&self) -> Result<T, ServiceError> {
        match &self.config_path {
            Some(path) => load_toml(path),
            None => Ok(T::default()),
        }
    }
}

/// Read and parse a TOML file, falling back to the default when absent.
pub fn load_toml<T: DeserializeOwned + Default>(path: &Path) -> Result<T, ServiceError> {
    if !path.exists() {
        debug!("config file {:?} does not exist, using defaults", path);
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ServiceError::Internal(format!("read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| ServiceError::Validation(format!("parse {}: {}", path.display(), e)))
}
