//! Configuration management.

use serde::Deserialize;
use std::path::PathBuf;

/// Default match distance threshold.
const DEFAULT_THRESHOLD: f32 = 0.6;

/// Default embedding dimensions (dlib face recognition model).
const DEFAULT_DIMENSIONS: usize = 128;

/// Default HTTP listen port.
const DEFAULT_PORT: u16 = 8001;

/// Default encoder sidecar URL.
const DEFAULT_ENCODER_URL: &str = "http://127.0.0.1:8100";

/// Main configuration for visage.
#[derive(Debug, Clone)]
pub struct VisageConfig {
    /// Root directory of the content store.
    pub data_dir: PathBuf,
    /// Base URL of the face encoder sidecar.
    pub encoder_url: String,
    /// Embedding dimensions the encoder produces.
    pub embedding_dims: usize,
    /// Default match distance threshold (inclusive).
    pub match_threshold: f32,
    /// HTTP listen port.
    pub port: u16,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Content store root.
    pub data_dir: Option<String>,
    /// Encoder sidecar URL.
    pub encoder_url: Option<String>,
    /// Embedding dimensions.
    pub embedding_dims: Option<usize>,
    /// Match threshold.
    pub match_threshold: Option<f32>,
    /// HTTP listen port.
    pub port: Option<u16>,
}

impl Default for VisageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("known_faces"),
            encoder_url: DEFAULT_ENCODER_URL.to_string(),
            embedding_dims: DEFAULT_DIMENSIONS,
            match_threshold: DEFAULT_THRESHOLD,
            port: DEFAULT_PORT,
        }
    }
}

impl VisageConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::storage("read_config_file", e))?;

        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| crate::Error::storage("parse_config_file", e))?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`~/.config/visage/config.toml` on
    /// Unix) and falls back to defaults if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(dirs) = directories::ProjectDirs::from("", "", "visage") else {
            return Self::default();
        };

        let path = dirs.config_dir().join("config.toml");
        if path.exists() {
            Self::load_from_file(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Applies values from a parsed config file over the defaults.
    #[must_use]
    pub fn from_config_file(file: ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: file.data_dir.map_or(defaults.data_dir, PathBuf::from),
            encoder_url: file.encoder_url.unwrap_or(defaults.encoder_url),
            embedding_dims: file.embedding_dims.unwrap_or(defaults.embedding_dims),
            match_threshold: file.match_threshold.unwrap_or(defaults.match_threshold),
            port: file.port.unwrap_or(defaults.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VisageConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("known_faces"));
        assert_eq!(config.embedding_dims, 128);
        assert!((config.match_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.port, 8001);
    }

    #[test]
    fn test_from_config_file_partial() {
        let file: ConfigFile = toml::from_str(
            r#"
            data_dir = "/var/lib/visage"
            match_threshold = 0.45
            "#,
        )
        .unwrap();

        let config = VisageConfig::from_config_file(file);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/visage"));
        assert!((config.match_threshold - 0.45).abs() < f32::EPSILON);
        // Untouched fields keep their defaults.
        assert_eq!(config.embedding_dims, 128);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = 9000\nencoder_url = \"http://enc:1\"").unwrap();

        let config = VisageConfig::load_from_file(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.encoder_url, "http://enc:1");
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let result = VisageConfig::load_from_file(std::path::Path::new("/nonexistent/c.toml"));
        assert!(result.is_err());
    }
}
