use serde::{Deserialize, Serialize};

use stockroom_core::{ServiceConfig, ServiceError};

use crate::grouping::GroupingMode;

/// Explorer settings, read from the `[explorer]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ExplorerConfig {
    /// Moves of more items than this ask for confirmation first.
    /// `0` means every move asks.
    pub max_move_without_confirm: usize,

    /// Grouping applied to containers when the explorer opens.
    pub default_grouping: GroupingMode,

    /// Base URL of the test-results service.
    pub test_results_url: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_move_without_confirm: 1,
            default_grouping: GroupingMode::None,
            test_results_url: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    explorer: ExplorerConfig,
}

impl ExplorerConfig {
    /// Build the explorer config from the config file named in
    /// `service`, then apply the command-line overrides.
    pub fn from_service_config(service: &ServiceConfig) -> Result<Self, ServiceError> {
        let file: ConfigFile = service.load_file()?;
        let mut config = file.explorer;
        if let Some(n) = service.max_move_without_confirm {
            config.max_move_without_confirm = n;
        }
        if let Some(url) = &service.test_results_url {
            config.test_results_url = url.clone();
        }
        Ok(config)
    }

    /// Whether moving `count` items needs a confirmation step.
    pub fn requires_confirmation(&self, count: usize) -> bool {
        self.max_move_without_confirm == 0 || count > self.max_move_without_confirm
    }

    pub fn apply(&mut self, patch: ExplorerConfigPatch) {
        if let Some(n) = patch.max_move_without_confirm {
            self.max_move_without_confirm = n;
        }
        if let Some(mode) = patch.default_grouping {
            self.default_grouping = mode;
        }
        if let Some(url) = patch.test_results_url {
            self.test_results_url = url;
        }
    }
}

/// Runtime change to the explorer config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExplorerConfigPatch {
    pub max_move_without_confirm: Option<usize>,
    pub default_grouping: Option<GroupingMode>,
    pub test_results_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_threshold() {
        let mut config = ExplorerConfig::default();
        assert!(!config.requires_confirmation(1));
        assert!(config.requires_confirmation(2));

        config.max_move_without_confirm = 0;
        assert!(config.requires_confirmation(1));

        config.max_move_without_confirm = 10;
        assert!(!config.requires_confirmation(10));
        assert!(config.requires_confirmation(11));
    }

    #[test]
    fn file_then_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockroom.toml");
        std::fs::write(
            &path,
            "[explorer]\nmax_move_without_confirm = 4\ndefault_grouping = \"sku\"\n",
        )
        .unwrap();

        let args = vec![
            format!("--config={}", path.display()),
            "--test-results-url=http://lab:9000".to_string(),
        ];
        let service = ServiceConfig::from_args(&args).unwrap();
        let config = ExplorerConfig::from_service_config(&service).unwrap();
        assert_eq!(config.max_move_without_confirm, 4);
        assert_eq!(config.default_grouping, GroupingMode::Sku);
        assert_eq!(config.test_results_url, "http://lab:9000");

        let args = vec![
            format!("--config={}", path.display()),
            "--max-move-without-confirm=0".to_string(),
        ];
        let service = ServiceConfig::from_args(&args).unwrap();
        let config = ExplorerConfig::from_service_config(&service).unwrap();
        assert_eq!(config.max_move_without_confirm, 0);
    }

    #[test]
    fn no_config_file_gives_defaults() {
        let config = ExplorerConfig::from_service_config(&ServiceConfig::default()).unwrap();
        assert_eq!(config, ExplorerConfig::default());
    }
}
