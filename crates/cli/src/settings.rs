//! Layered settings: optional TOML file, then `EDR_` environment variables

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use detection::DetectionConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use storage::SqliteConfig;

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "edr.toml";

/// Binary settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log_level: String,
    pub log_json: bool,
    /// Prometheus exporter address; no exporter when unset
    pub metrics_listen: Option<SocketAddr>,
    pub store: SqliteConfig,
    pub detection: DetectionConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_listen: None,
            store: SqliteConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

/// `EDR_` variables with `__` between nested keys, e.g. `EDR_STORE__URL`
pub fn environment() -> Environment {
    Environment::with_prefix("EDR")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("detection.accepted_object_types")
        .try_parsing(true)
}

impl Settings {
    /// Load from `path` (must exist) or the default file (optional), then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path, true, environment()),
            None => Self::load_from(Path::new(DEFAULT_CONFIG_FILE), false, environment()),
        }
    }

    pub fn load_from(path: &Path, required: bool, env: Environment) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to read settings from {}", path.display()))?
            .try_deserialize()
            .context("Invalid settings")?;

        settings.detection.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;
    use detection::EventOrder;
    use std::io::Write;

    fn no_env() -> Environment {
        environment().source(Some(Map::new()))
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.toml"), false, no_env()).unwrap();

        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.store.url, "sqlite://edr.db");
        assert_eq!(settings.detection.confidence_threshold, 0.8);
        assert!(settings.metrics_listen.is_none());
    }

    #[test]
    fn test_required_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load_from(&dir.path().join("absent.toml"), true, no_env()).is_err());
    }

    #[test]
    fn test_file_values() {
        let file = write_config(
            r#"
log_level = "debug"
metrics_listen = "127.0.0.1:9464"

[store]
url = "sqlite::memory:"

[detection]
accepted_object_types = ["cyclist"]
confidence_threshold = 0.9
event_order = "timestamp"
"#,
        );
        let settings = Settings::load_from(file.path(), true, no_env()).unwrap();

        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.metrics_listen, Some("127.0.0.1:9464".parse().unwrap()));
        assert_eq!(settings.store.url, "sqlite::memory:");
        assert_eq!(settings.store.max_connections, 5);
        assert_eq!(settings.detection.accepted_object_types.len(), 1);
        assert_eq!(settings.detection.confidence_threshold, 0.9);
        assert_eq!(settings.detection.event_order, EventOrder::Timestamp);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config("[store]\nurl = \"sqlite://file.db\"\n");
        let mut vars = Map::new();
        vars.insert("EDR_STORE__URL".to_string(), "sqlite://env.db".to_string());
        vars.insert(
            "EDR_DETECTION__ACCEPTED_OBJECT_TYPES".to_string(),
            "tree,sign".to_string(),
        );
        vars.insert("EDR_LOG_JSON".to_string(), "true".to_string());

        let env = environment().source(Some(vars));
        let settings = Settings::load_from(file.path(), true, env).unwrap();

        assert_eq!(settings.store.url, "sqlite://env.db");
        assert!(settings.log_json);
        assert!(settings.detection.accepted_object_types.contains("tree"));
        assert!(settings.detection.accepted_object_types.contains("sign"));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let file = write_config("[detection]\nconfidence_threshold = 1.5\n");
        assert!(Settings::load_from(file.path(), true, no_env()).is_err());
    }
}
