//! Engine configuration and loaders.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ConfigError;

/// Tuning parameters for a completion session.
///
/// Every field has a sensible default; hosts typically start from
/// `CompletionConfig::default()` and override a couple of knobs, or load a
/// file through [`ConfigLoader`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Query sources automatically while the user types.
    pub activate_on_typing: bool,
    /// Highlight the first candidate when the list opens. When false the
    /// list opens unselected and accept requires an explicit index.
    pub select_on_open: bool,
    /// Close the session when the editor loses focus.
    pub close_on_blur: bool,
    /// Quiet period after the last qualifying keystroke before sources are
    /// queried, in milliseconds.
    pub debounce_ms: u64,
    /// Upper bound on the merged candidate list handed to the renderer.
    pub max_candidates: usize,
    /// How many entries a page-granularity selection move skips.
    pub page_size: usize,
    /// Characters that qualify an edit for implicit triggering in addition
    /// to identifier characters.
    pub trigger_characters: Vec<char>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            activate_on_typing: true,
            select_on_open: true,
            close_on_blur: true,
            debounce_ms: 100,
            max_candidates: 50,
            page_size: 10,
            trigger_characters: vec!['.'],
        }
    }
}

impl CompletionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn is_trigger_char(&self, ch: char) -> bool {
        self.trigger_characters.contains(&ch)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_candidates == 0 {
            return Err(ConfigError::Invalid(
                "max_candidates must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid(
                "page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

/// Loads and validates completion configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a string in the given format.
    pub fn load_from_string(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CompletionConfig, ConfigError> {
        let config: CompletionConfig = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, picking the format by extension.
    pub fn load_from_path(path: &Path) -> Result<CompletionConfig, ConfigError> {
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            Some("json") => ConfigFormat::Json,
            other => {
                return Err(ConfigError::UnknownFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        let content = std::fs::read_to_string(path)?;
        Self::load_from_string(&content, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = CompletionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.debounce(), Duration::from_millis(100));
        assert!(config.is_trigger_char('.'));
        assert!(!config.is_trigger_char('x'));
    }

    #[test]
    fn test_validate_rejects_zero_max_candidates() {
        let config = CompletionConfig {
            max_candidates: 0,
            ..CompletionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = CompletionConfig {
            page_size: 0,
            ..CompletionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_yaml_string() {
        let config = ConfigLoader::load_from_string(
            "debounce_ms: 50\nmax_candidates: 20\ntrigger_characters: ['.', ':']\n",
            ConfigFormat::Yaml,
        )
        .unwrap();

        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.max_candidates, 20);
        assert!(config.is_trigger_char(':'));
        // Unspecified fields keep their defaults.
        assert!(config.activate_on_typing);
    }

    #[test]
    fn test_load_from_json_string() {
        let config = ConfigLoader::load_from_string(
            r#"{"activate_on_typing": false, "page_size": 5}"#,
            ConfigFormat::Json,
        )
        .unwrap();

        assert!(!config.activate_on_typing);
        assert_eq!(config.page_size, 5);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let result = ConfigLoader::load_from_string("max_candidates: 0\n", ConfigFormat::Yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completion.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "debounce_ms: 30").unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.debounce_ms, 30);
    }

    #[test]
    fn test_load_from_path_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completion.toml");
        std::fs::write(&path, "debounce_ms = 30").unwrap();

        let result = ConfigLoader::load_from_path(&path);
        assert!(matches!(result, Err(ConfigError::UnknownFormat(_))));
    }
}
