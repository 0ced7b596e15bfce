//! Loading of the monitor definition file.
//!
//! The file is a TOML document where every top-level table is one monitor
//! target, keyed by its name:
//!
//! ```toml
//! [example-site]
//! type = "slack"
//! check_url = "https://example.com/"
//! api_token = "xoxb-..."
//! channel = "#ops"
//! check_only_top_of_status_code = true
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "./config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Monitor `{0}` must be a table of key/value pairs")]
    NotATable(String),
    #[error("Monitor `{name}` has an unsupported value for `{key}` (arrays and tables are not allowed)")]
    UnsupportedValue { name: String, key: String },
}

/// One configured endpoint plus its notifier settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorTarget {
    pub name: String,
    pub values: HashMap<String, String>,
}

impl MonitorTarget {
    pub fn new(name: impl Into<String>, values: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value for `key`, or an empty string when absent.
    pub fn value_or_empty(&self, key: &str) -> String {
        self.values.get(key).cloned().unwrap_or_default()
    }

    /// Whether `check_only_top_of_status_code` is switched on.
    pub fn check_only_top_of_status_code(&self) -> bool {
        self.get("check_only_top_of_status_code") == Some("true")
    }
}

pub fn load_monitor_config(config_path_str: &str) -> Result<Vec<MonitorTarget>, ConfigError> {
    let config_path = Path::new(config_path_str);
    info!(path = %config_path_str, "Attempting to load monitor config.");

    let config_str = fs::read_to_string(config_path).map_err(|e| {
        error!(path = %config_path_str, error = %e, "Failed to read monitor config file.");
        ConfigError::Read {
            path: config_path_str.to_string(),
            source: e,
        }
    })?;

    let targets = parse_monitor_config(&config_str).map_err(|e| match e {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: config_path_str.to_string(),
            source,
        },
        other => other,
    })?;

    info!(path = %config_path_str, monitors = targets.len(), "Loaded monitor config successfully.");
    Ok(targets)
}

pub fn parse_monitor_config(contents: &str) -> Result<Vec<MonitorTarget>, ConfigError> {
    let document: toml::Table = toml::from_str(contents).map_err(|e| ConfigError::Parse {
        path: String::new(),
        source: e,
    })?;

    let mut targets = Vec::with_capacity(document.len());
    for (name, entry) in document {
        let table = match entry {
            toml::Value::Table(table) => table,
            _ => return Err(ConfigError::NotATable(name)),
        };

        let mut values = HashMap::with_capacity(table.len());
        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Datetime(dt) => dt.to_string(),
                toml::Value::Array(_) | toml::Value::Table(_) => {
                    return Err(ConfigError::UnsupportedValue { name, key });
                }
            };
            values.insert(key, value);
        }
        targets.push(MonitorTarget::new(name, values));
    }

    Ok(targets)
}
