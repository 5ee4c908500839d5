use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tandem_backend::{ApprovalMode, ResponseMode};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// External AI backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Path or name of the external AI binary
    pub binary_path: String,
    /// Model name override passed through to the backend
    pub model: Option<String>,
    /// API key override (handed to the backend via its environment)
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            binary_path: "gemini".to_string(),
            model: None,
            api_key: None,
        }
    }
}

/// Per-conversation defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub approval_mode: ApprovalMode,
    #[serde(default)]
    pub response_mode: ResponseMode,
    /// Directories always offered to the backend as context
    #[serde(default)]
    pub include_directories: Vec<String>,
}

/// Tool enablement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Enabled tool names; None enables the full registry
    pub enabled: Option<Vec<String>>,
}

/// Temp-resource cleanup tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    pub sweep_interval_secs: u64,
    pub max_age_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            max_age_secs: 600,
        }
    }
}

const DEFAULT_SEARCH_PATHS: [&str; 3] = [
    "./tandem.toml",
    "~/.config/tandem/config.toml",
    "~/.tandem.toml",
];

impl Config {
    /// Load configuration from an explicit path or the default search
    /// locations. When no config file exists, a default one is written to
    /// the user config directory and the defaults are returned.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path_to_load = if let Some(path) = config_path {
            if !Path::new(path).exists() {
                anyhow::bail!("config file not found: {}", path);
            }
            Some(path.to_string())
        } else {
            DEFAULT_SEARCH_PATHS.iter().find_map(|path| {
                let expanded = shellexpand::tilde(path);
                Path::new(expanded.as_ref())
                    .exists()
                    .then(|| expanded.to_string())
            })
        };

        if let Some(path) = path_to_load {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }

        // First run: persist the defaults so the user has a file to edit.
        let default_config = Self::default();
        if let Some(config_dir) = dirs::home_dir().map(|p| p.join(".config").join("tandem")) {
            std::fs::create_dir_all(&config_dir).ok();
            let config_file = config_dir.join("config.toml");
            if let Err(e) = default_config.save(&config_file) {
                eprintln!("Warning: could not save default config: {}", e);
            }
        }

        Ok(default_config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend.binary_path, "gemini");
        assert_eq!(config.chat.approval_mode, ApprovalMode::Default);
        assert_eq!(config.chat.response_mode, ResponseMode::Async);
        assert!(config.tools.enabled.is_none());
        assert_eq!(config.cleanup.sweep_interval_secs, 60);
        assert_eq!(config.cleanup.max_age_secs, 600);
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
[backend]
binary_path = "/usr/local/bin/ai"
model = "large"

[chat]
approval_mode = "auto_edit"
response_mode = "stream"
include_directories = ["src"]

[tools]
enabled = ["read_file", "write_file"]

[cleanup]
sweep_interval_secs = 30
max_age_secs = 120
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.backend.binary_path, "/usr/local/bin/ai");
        assert_eq!(config.backend.model.as_deref(), Some("large"));
        assert_eq!(config.chat.approval_mode, ApprovalMode::AutoEdit);
        assert_eq!(config.chat.response_mode, ResponseMode::Stream);
        assert_eq!(
            config.tools.enabled,
            Some(vec!["read_file".to_string(), "write_file".to_string()])
        );
        assert_eq!(config.cleanup.max_age_secs, 120);
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config: Config = toml::from_str("[chat]\napproval_mode = \"yolo\"\n").unwrap();
        assert_eq!(config.chat.approval_mode, ApprovalMode::Yolo);
        assert_eq!(config.backend.binary_path, "gemini");
        assert_eq!(config.cleanup.sweep_interval_secs, 60);
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.chat.approval_mode = ApprovalMode::Yolo;
        config.backend.model = Some("small".to_string());
        config.save(&path).unwrap();

        let reloaded = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(reloaded.chat.approval_mode, ApprovalMode::Yolo);
        assert_eq!(reloaded.backend.model.as_deref(), Some("small"));
    }

    #[test]
    fn test_explicit_missing_path_errors() {
        assert!(Config::load(Some("/definitely/not/here.toml")).is_err());
    }
}
