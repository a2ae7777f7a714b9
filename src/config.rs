//! Configuration for the OnBase service.
//!
//! Settings come from command-line flags, an optional YAML file and the
//! environment, in that order of precedence:
//!
//! ```yaml
//! database_url: postgres://onbase@localhost/banner
//! host: 0.0.0.0
//! port: 8080
//! base_url: https://api.oregonstate.edu/v1
//! max_connections: 16
//! fetch_limit: 50000
//! formats:
//!   holds:
//!     delimiter: "‡"
//!   admission:
//!     error_position: 22
//! ```

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::line_reader::{DEFAULT_FETCH_LIMIT, LineReader};
use crate::record::LineFormats;
use crate::{LineFormat, ResourceKind};

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default bind port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Errors loading or resolving configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(String),
    /// The configuration file is not valid YAML for [`ServiceConfig`].
    Yaml(String),
    /// No database URL was given by flag, file or environment.
    MissingDatabaseUrl,
    /// The base URL is not an absolute http(s) URL.
    InvalidBaseUrl(String),
    /// A setting is out of range.
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ConfigError::Io(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::Yaml(msg) => write!(f, "invalid config: {}", msg),
            ConfigError::MissingDatabaseUrl => write!(
                f,
                "no database URL: pass --database-url, set database_url or DATABASE_URL"
            ),
            ConfigError::InvalidBaseUrl(msg) => write!(f, "invalid base URL: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid setting: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Per-kind overrides of the line format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatOverride {
    /// Field delimiter.
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Position of the error signal.
    #[serde(default)]
    pub error_position: Option<usize>,
}

/// The YAML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub fetch_limit: Option<usize>,
    #[serde(default)]
    pub formats: HashMap<ResourceKind, FormatOverride>,
}

impl ServiceConfig {
    /// Parses YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        serde_yml::from_str(text).map_err(|e| ConfigError::Yaml(e.to_string()))
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    /// Default line formats with this file's overrides applied.
    pub fn line_formats(&self) -> Result<LineFormats, ConfigError> {
        let mut formats = LineFormats::default();
        for (kind, over) in &self.formats {
            let base = formats.get(*kind).clone();
            let delimiter = over.delimiter.clone().unwrap_or(base.delimiter);
            if delimiter.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{:?} delimiter must not be empty",
                    kind
                )));
            }
            let error_position = over.error_position.unwrap_or(base.error_position);
            formats.set(*kind, LineFormat::new(delimiter, error_position));
        }
        Ok(formats)
    }

    /// The line reader with this file's fetch limit.
    pub fn line_reader(&self) -> Result<LineReader, ConfigError> {
        match self.fetch_limit.unwrap_or(DEFAULT_FETCH_LIMIT) {
            0 => Err(ConfigError::Invalid(
                "fetch_limit must be positive".to_string(),
            )),
            limit => Ok(LineReader::new(limit)),
        }
    }
}

/// Values given on the command line; each wins over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_url: Option<String>,
    pub max_connections: Option<u32>,
}

/// Fully resolved service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub max_connections: u32,
}

impl Settings {
    /// Resolves flags over the file over `env_database_url` over defaults.
    pub fn resolve(
        overrides: Overrides,
        config: &ServiceConfig,
        env_database_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let database_url = overrides
            .database_url
            .or_else(|| config.database_url.clone())
            .or(env_database_url)
            .ok_or(ConfigError::MissingDatabaseUrl)?;
        let host = overrides
            .host
            .or_else(|| config.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = overrides.port.or(config.port).unwrap_or(DEFAULT_PORT);
        let base_url = overrides
            .base_url
            .or_else(|| config.base_url.clone())
            .unwrap_or_else(|| format!("http://{}:{}/api/v1", host, port));
        validate_base_url(&base_url)?;
        let max_connections = overrides
            .max_connections
            .or(config.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be positive".to_string(),
            ));
        }
        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            max_connections,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn validate_base_url(base_url: &str) -> Result<(), ConfigError> {
    let parsed =
        url::Url::parse(base_url).map_err(|e| ConfigError::InvalidBaseUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidBaseUrl(format!(
            "unsupported scheme {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
database_url: postgres://file/banner
port: 9000
fetch_limit: 500
formats:
  holds:
    delimiter: "‡"
  admission:
    error_position: 22
"#;

    #[test]
    fn parses_yaml_with_format_overrides() {
        let config = ServiceConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.port, Some(9000));
        let formats = config.line_formats().unwrap();
        assert_eq!(formats.get(ResourceKind::Holds), &LineFormat::new("‡", 17));
        assert_eq!(formats.get(ResourceKind::Admission), &LineFormat::new(";", 22));
        assert_eq!(
            formats.get(ResourceKind::Document),
            &ResourceKind::Document.default_format()
        );
        assert_eq!(config.line_reader().unwrap().fetch_limit(), 500);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            ServiceConfig::from_yaml("colour: blue\n"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn flags_win_over_file_over_environment() {
        let config = ServiceConfig::from_yaml(YAML).unwrap();
        let settings = Settings::resolve(
            Overrides {
                port: Some(7000),
                ..Overrides::default()
            },
            &config,
            Some("postgres://env/banner".to_string()),
        )
        .unwrap();
        assert_eq!(settings.port, 7000);
        assert_eq!(settings.database_url, "postgres://file/banner");
        assert_eq!(settings.host, DEFAULT_HOST);
        assert_eq!(settings.base_url, "http://127.0.0.1:7000/api/v1");

        let from_env = Settings::resolve(
            Overrides::default(),
            &ServiceConfig::default(),
            Some("postgres://env/banner".to_string()),
        )
        .unwrap();
        assert_eq!(from_env.database_url, "postgres://env/banner");
        assert_eq!(from_env.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn database_url_is_required() {
        assert_eq!(
            Settings::resolve(Overrides::default(), &ServiceConfig::default(), None),
            Err(ConfigError::MissingDatabaseUrl)
        );
    }

    #[test]
    fn base_url_must_be_http() {
        let overrides = Overrides {
            database_url: Some("postgres://x/y".to_string()),
            base_url: Some("ftp://example.edu/v1".to_string()),
            ..Overrides::default()
        };
        assert!(matches!(
            Settings::resolve(overrides, &ServiceConfig::default(), None),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn zero_limits_are_invalid() {
        let config = ServiceConfig::from_yaml("fetch_limit: 0\n").unwrap();
        assert!(config.line_reader().is_err());
        let empty = ServiceConfig::from_yaml("formats:\n  holds:\n    delimiter: \"\"\n").unwrap();
        assert!(empty.line_formats().is_err());
    }
}
