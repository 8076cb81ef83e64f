use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::face_detector::SelectionPolicy;
use crate::OutputFormat;

/// Service-level settings, loadable from TOML.
///
/// ```toml
/// output_size = 256
/// background_removal = false
/// selection_policy = "most-centered"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarConfig {
    /// Edge of the square output, in pixels.
    #[serde(default = "default_output_size")]
    pub output_size: u32,

    /// Attempt background removal when a remover is attached.
    #[serde(default = "default_true")]
    pub background_removal: bool,

    /// Run face detection. When off, the portrait fallback crop is used.
    #[serde(default = "default_true")]
    pub auto_crop: bool,

    /// Budget for the background-removal call, in milliseconds.
    #[serde(default = "default_background_timeout_ms")]
    pub background_timeout_ms: u64,

    /// Tie-break among same-pass face candidates.
    #[serde(default)]
    pub selection_policy: SelectionPolicy,

    /// Output encoding.
    #[serde(default)]
    pub format: OutputFormat,

    /// SeetaFace model for the `rustface` backend.
    #[serde(default)]
    pub rustface_model: Option<PathBuf>,
}

fn default_output_size() -> u32 {
    512
}

fn default_true() -> bool {
    true
}

fn default_background_timeout_ms() -> u64 {
    10_000
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            output_size: default_output_size(),
            background_removal: default_true(),
            auto_crop: default_true(),
            background_timeout_ms: default_background_timeout_ms(),
            selection_policy: SelectionPolicy::default(),
            format: OutputFormat::default(),
            rustface_model: None,
        }
    }
}

impl AvatarConfig {
    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// [`background_timeout_ms`](Self::background_timeout_ms) as a `Duration`.
    pub fn background_timeout(&self) -> Duration {
        Duration::from_millis(self.background_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = AvatarConfig::from_toml_str("").unwrap();
        assert_eq!(config, AvatarConfig::default());
        assert_eq!(config.output_size, 512);
        assert!(config.background_removal);
        assert!(config.auto_crop);
        assert_eq!(config.background_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn overrides_are_applied() {
        let config = AvatarConfig::from_toml_str(
            r#"
            output_size = 256
            background_removal = false
            background_timeout_ms = 1500
            selection_policy = "most-centered"
            format = "webp"
            rustface_model = "/models/seeta_fd_frontal_v1.0.bin"
            "#,
        )
        .unwrap();
        assert_eq!(config.output_size, 256);
        assert!(!config.background_removal);
        assert!(config.auto_crop);
        assert_eq!(config.background_timeout(), Duration::from_millis(1500));
        assert_eq!(config.selection_policy, SelectionPolicy::MostCentered);
        assert_eq!(config.format, OutputFormat::Webp);
        assert_eq!(
            config.rustface_model.as_deref(),
            Some(Path::new("/models/seeta_fd_frontal_v1.0.bin"))
        );
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let result = AvatarConfig::from_toml_str(r#"selection_policy = "leftmost""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = AvatarConfig::load("/nonexistent/avatarframe.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
