//! # mb-config
//!
//! Layered configuration for medboard: built-in defaults, then an optional
//! `medboard.toml`, then `MEDBOARD__SECTION__KEY` environment variables
//! (a `.env` file is loaded first if present).

pub mod telemetry;

use std::path::PathBuf;
use std::time::Duration;

use mb_core::OrphanPolicy;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

pub use telemetry::init_tracing;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to initialise tracing: {0}")]
    Telemetry(String),
}

/// Top-level settings. Every section falls back to its defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gate: GateConfig,
    pub submission: SubmissionConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub tables: TablesConfig,
    pub log: LogConfig,
}

/// Access gate timing and destination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Grace period before an unauthorized actor is redirected.
    pub redirect_delay_ms: u64,
    pub redirect_to: String,
}

impl GateConfig {
    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            redirect_delay_ms: 1500,
            redirect_to: "/doctors/authenticate".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Where the form navigates after a post is created.
    pub success_redirect: String,
    pub orphan_policy: OrphanPolicy,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            success_redirect: "/doctors/all-post".to_string(),
            orphan_policy: OrphanPolicy::Record,
        }
    }
}

/// Object storage layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: String,
    /// Top-level folder for post images inside the bucket.
    pub folder: String,
    /// Prefix of every public object URL.
    pub public_base_url: String,
    /// Filesystem root used by the local storage plugin.
    pub root_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "images".to_string(),
            folder: "post".to_string(),
            public_base_url: "/storage/v1/object/public".to_string(),
            root_dir: PathBuf::from("./data/objects"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: SecretString,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: SecretString::from("sqlite:medboard.db".to_string()),
            max_connections: 5,
        }
    }
}

/// Table names, matching the existing schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub posts: String,
    pub doctors: String,
    pub users: String,
    pub alerts: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            posts: "posts".to_string(),
            doctors: "doctors".to_string(),
            users: "user".to_string(),
            alerts: "alerts".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Loads `medboard.toml` (optional) from the working directory plus the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("medboard")
    }

    /// Loads from `file` (extension optional, file optional) plus the environment.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("MEDBOARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.validate()?;
        tracing::debug!(file, "configuration loaded");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gate.redirect_to.trim().is_empty() {
            return Err(ConfigError::Invalid("gate.redirect_to must not be empty".into()));
        }
        if self.submission.success_redirect.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "submission.success_redirect must not be empty".into(),
            ));
        }
        if self.storage.folder.is_empty() || self.storage.folder.contains('/') {
            return Err(ConfigError::Invalid(
                "storage.folder must be a single non-empty path segment".into(),
            ));
        }
        for (key, name) in [
            ("tables.posts", &self.tables.posts),
            ("tables.doctors", &self.tables.doctors),
            ("tables.users", &self.tables.users),
            ("tables.alerts", &self.tables.alerts),
        ] {
            if !is_identifier(name) {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be a plain SQL identifier, got {name:?}"
                )));
            }
        }
        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    #[test]
    fn defaults_match_the_existing_deployment() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.gate.redirect_delay(), Duration::from_millis(1500));
        assert_eq!(cfg.gate.redirect_to, "/doctors/authenticate");
        assert_eq!(cfg.submission.success_redirect, "/doctors/all-post");
        assert_eq!(cfg.submission.orphan_policy, OrphanPolicy::Record);
        assert_eq!(cfg.storage.bucket, "images");
        assert_eq!(cfg.storage.folder, "post");
        assert_eq!(cfg.tables.users, "user");
        assert_eq!(cfg.database.url.expose_secret(), "sqlite:medboard.db");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn file_overrides_individual_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medboard.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[gate]\nredirect_delay_ms = 250\n\n[submission]\norphan_policy = \"delete\"\n\n[database]\nurl = \"sqlite::memory:\""
        )
        .unwrap();

        let cfg = AppConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.gate.redirect_delay_ms, 250);
        // Untouched keys keep their defaults.
        assert_eq!(cfg.gate.redirect_to, "/doctors/authenticate");
        assert_eq!(cfg.submission.orphan_policy, OrphanPolicy::Delete);
        assert_eq!(cfg.database.url.expose_secret(), "sqlite::memory:");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = AppConfig::load_from("/nonexistent/medboard-test-config").unwrap();
        assert_eq!(cfg.storage.folder, "post");
    }

    #[test]
    fn rejects_table_names_that_are_not_identifiers() {
        let mut cfg = AppConfig::default();
        cfg.tables.posts = "posts; DROP TABLE user".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_nested_folder() {
        let mut cfg = AppConfig::default();
        cfg.storage.folder = "post/images".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn identifier_rules() {
        assert!(is_identifier("posts"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1posts"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("user-table"));
    }
}
