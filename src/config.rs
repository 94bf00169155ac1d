//! Layered configuration.
//!
//! Settings are merged, lowest precedence first, from:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config PATH`, or `config.toml` in the platform
//!    config directory when it exists)
//! 3. `DUPGROUP_*` environment variables (`DUPGROUP_IO_THREADS=8`)
//! 4. command-line flags, applied by the caller
//!
//! ```toml
//! filters = ["size", "blake3"]
//! threshold = 2
//! recursive = true
//! io_threads = 4
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grouping::DEFAULT_BLANK_CHECK_LEN;

/// Prefix of the environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "DUPGROUP_";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// A provider held a value of the wrong shape.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

/// Settings that can come from a file or the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filter chain used when no filter flags are given
    pub filters: Vec<String>,
    /// Minimum group size
    pub threshold: usize,
    /// Threads computing signatures
    pub io_threads: usize,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Maximum directory depth when recursive
    pub max_depth: Option<usize>,
    /// Walk hidden files and directories
    pub follow_hidden: bool,
    /// Admit empty files
    pub empty_file: bool,
    /// Follow symbolic links
    pub follow_symbolic: bool,
    /// Stop at the first file that cannot be processed
    pub strict: bool,
    /// Length under which whitespace signatures count as blank
    pub blank_check_len: usize,
    /// Print only member paths
    pub basic_formatting: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filters: vec!["size".to_string(), "md5".to_string()],
            threshold: 1,
            io_threads: 1,
            recursive: false,
            max_depth: None,
            follow_hidden: false,
            empty_file: false,
            follow_symbolic: false,
            strict: false,
            blank_check_len: DEFAULT_BLANK_CHECK_LEN,
            basic_formatting: false,
        }
    }
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NotFound`] when `explicit` names a missing file, and
    /// [`ConfigError::Invalid`] when a value cannot be deserialized.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match explicit {
            Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => default_path().filter(|p| p.is_file()),
        };
        if let Some(ref path) = file {
            log::debug!("Loading configuration from {}", path.display());
        }
        Self::figment(file.as_deref()).extract().map_err(|e| Box::new(e).into())
    }

    /// The provider stack behind [`Config::load`].
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }
}

/// `config.toml` in the platform config directory.
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "dupgroup").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .extract()
            .unwrap();
        assert_eq!(config.filters, vec!["size", "md5"]);
        assert_eq!(config.threshold, 1);
        assert_eq!(config.blank_check_len, 10);
        assert!(!config.recursive);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "filters = [\"size\", \"blake3\"]\nthreshold = 2\nrecursive = true\nmax_depth = 3\n",
        )
        .unwrap();

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .extract()
            .unwrap();
        assert_eq!(config.filters, vec!["size", "blake3"]);
        assert_eq!(config.threshold, 2);
        assert!(config.recursive);
        assert_eq!(config.max_depth, Some(3));
        assert_eq!(config.io_threads, 1);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::NotFound(p)) if p == missing
        ));
    }

    #[test]
    fn test_invalid_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "threshold = \"many\"\n").unwrap();

        let result: Result<Config, _> = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .extract();
        assert!(result.is_err());
    }
}
