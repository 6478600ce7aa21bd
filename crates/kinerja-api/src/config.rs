//! # Configuration
//!
//! Layered configuration, lowest precedence first:
//!
//! 1. built-in defaults (port 4000, authentication disabled, no page cap)
//! 2. an optional YAML file (`--config` / `KINERJA_CONFIG`)
//! 3. command-line flags and their environment variables
//!    (`PORT`, `KINERJA_AUTH_SECRET`, `KINERJA_MAX_PAGE_LIMIT`)

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::AuthSecret;

/// Application configuration.
///
/// `Debug` is derived: [`AuthSecret`] redacts itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. If `None`, authentication is disabled.
    pub auth_secret: Option<AuthSecret>,
    /// Upper bound applied to the `limit` query parameter. `None` leaves
    /// page size unbounded.
    pub max_page_limit: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            auth_secret: None,
            max_page_limit: None,
        }
    }
}

/// Error loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

impl AppConfig {
    /// Load a YAML file. Keys left out keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }
}

/// Kinerja API server.
///
/// Serves the academic performance REST API under `/api/v1`.
#[derive(Parser, Debug, Default)]
#[command(name = "kinerja-api", version, about, long_about = None)]
pub struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long, env = "KINERJA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Shared bearer secret. Leave unset to disable authentication.
    #[arg(long, env = "KINERJA_AUTH_SECRET", hide_env_values = true)]
    pub auth_secret: Option<String>,

    /// Maximum accepted page size.
    #[arg(long, env = "KINERJA_MAX_PAGE_LIMIT")]
    pub max_page_limit: Option<u64>,
}

impl Cli {
    /// Resolve the effective configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_yaml_file(path)?,
            None => AppConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secret) = &self.auth_secret {
            config.auth_secret = Some(AuthSecret::new(secret.clone()));
        }
        if let Some(max) = self.max_page_limit {
            config.max_page_limit = Some(max);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.port, 4000);
        assert!(config.auth_secret.is_none());
        assert!(config.max_page_limit.is_none());
    }

    #[test]
    fn debug_redacts_secret() {
        let config = AppConfig {
            auth_secret: Some(AuthSecret::new("hunter2")),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let file = yaml_file("port: 8081\nauth_secret: from-file\nmax_page_limit: 50\n");
        let config = AppConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.auth_secret, Some(AuthSecret::new("from-file")));
        assert_eq!(config.max_page_limit, Some(50));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let file = yaml_file("max_page_limit: 25\n");
        let config = AppConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.max_page_limit, Some(25));
    }

    #[test]
    fn empty_yaml_is_default() {
        let file = yaml_file("");
        assert_eq!(AppConfig::from_yaml_file(file.path()).unwrap(), AppConfig::default());
    }

    #[test]
    fn unknown_yaml_key_rejected() {
        let file = yaml_file("listen_port: 1\n");
        let err = AppConfig::from_yaml_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = AppConfig::from_yaml_file(Path::new("/nonexistent/kinerja.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/kinerja.yaml"));
    }

    #[test]
    fn flags_override_file() {
        let file = yaml_file("port: 8081\nauth_secret: from-file\n");
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            port: Some(9000),
            auth_secret: Some("from-flag".into()),
            max_page_limit: None,
        };
        let config = cli.load().unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.auth_secret, Some(AuthSecret::new("from-flag")));
        assert_eq!(config.max_page_limit, None);
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "kinerja-api",
            "--port",
            "5000",
            "--max-page-limit",
            "100",
        ])
        .unwrap();
        assert_eq!(cli.port, Some(5000));
        assert_eq!(cli.max_page_limit, Some(100));
    }
}
