//! Configuration for the code validator.
//!
//! Configuration is loaded from `~/.config/sandgate/validator.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Validator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Modules sandboxed code may import. Blocked modules stay blocked even
    /// when listed here.
    #[serde(default)]
    pub allowed_imports: Vec<String>,
}

impl ValidatorConfig {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Get the default config file path.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "sandgate")
            .context("Could not determine config directory")?;

        Ok(dirs.config_dir().join("validator.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ValidatorConfig::default();
        assert!(config.allowed_imports.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"allowed_imports = ["json", "math", "collections.abc"]"#;
        let config: ValidatorConfig = toml::from_str(toml).expect("parse failed");
        assert_eq!(config.allowed_imports, vec!["json", "math", "collections.abc"]);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: ValidatorConfig = toml::from_str("").expect("parse failed");
        assert_eq!(config, ValidatorConfig::default());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<ValidatorConfig>("allowed_import = []").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "allowed_imports = [\"re\"]").expect("write");
        let config = ValidatorConfig::load_from(file.path()).expect("load");
        assert_eq!(config.allowed_imports, vec!["re"]);
    }

    #[test]
    fn test_load_errors_name_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        let err = ValidatorConfig::load_from(&missing).expect_err("missing file");
        assert!(format!("{:#}", err).contains("nope.toml"));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "allowed_imports = 3").expect("write");
        let err = ValidatorConfig::load_from(&bad).expect_err("bad type");
        assert!(err.to_string().contains("Failed to parse config from"));
    }
}
