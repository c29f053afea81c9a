//! Storage and logging configuration.
//!
//! # Responsibility
//! - Turn connection strings into validated [`ContextOptions`].
//! - Load the TOML configuration file and apply environment overrides.
//!
//! # Invariants
//! - There is no default connection target; one must be supplied.
//! - `CATALOG_CONNECTION_STRING` wins over the file's connection string.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

mod connection;

pub use connection::{ContextOptions, DataSource, OpenMode};

/// Environment variable that overrides `[database].connection_string`.
pub const CONNECTION_STRING_ENV: &str = "CATALOG_CONNECTION_STRING";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    MissingConnectionString,
    MalformedSegment(String),
    UnknownKey(String),
    EmptyValue(String),
    InvalidMode(String),
    InvalidTimeout(String),
    Unreachable {
        target: String,
        source: rusqlite::Error,
    },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingConnectionString => {
                write!(f, "connection string is missing a data source")
            }
            Self::MalformedSegment(segment) => {
                write!(f, "connection string segment `{segment}` is not key=value")
            }
            Self::UnknownKey(key) => write!(f, "unknown connection string key `{key}`"),
            Self::EmptyValue(key) => write!(f, "connection string key `{key}` has no value"),
            Self::InvalidMode(mode) => write!(
                f,
                "unsupported mode `{mode}`; expected ReadWriteCreate|ReadWrite|ReadOnly|Memory"
            ),
            Self::InvalidTimeout(value) => {
                write!(f, "default timeout `{value}` is not a number of seconds")
            }
            Self::Unreachable { target, source } => {
                write!(f, "storage `{target}` is unreachable: {source}")
            }
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unreachable { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnresolvedConfig {
    database: Option<UnresolvedDatabaseConfig>,
    #[serde(default)]
    logging: UnresolvedLoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnresolvedDatabaseConfig {
    connection_string: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnresolvedLoggingConfig {
    level: Option<String>,
    directory: Option<PathBuf>,
}

/// Logging section of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`; checked by `init_logging`.
    pub level: String,
    /// Absolute log directory. Logging stays off when `None`.
    pub directory: Option<PathBuf>,
}

/// Fully resolved application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database: ContextOptions,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads a TOML configuration file, honoring `CATALOG_CONNECTION_STRING`.
    pub fn load_from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let env_override = std::env::var(CONNECTION_STRING_ENV).ok();

        Self::from_toml_str(&contents, env_override.as_deref()).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Resolves configuration from TOML text and an optional override.
    ///
    /// A blank override is ignored.
    pub fn from_toml_str(contents: &str, connection_override: Option<&str>) -> ConfigResult<Self> {
        let unresolved: UnresolvedConfig =
            toml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;

        let connection_string = connection_override
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
            .or_else(|| unresolved.database.and_then(|db| db.connection_string))
            .ok_or(ConfigError::MissingConnectionString)?;

        Ok(Self {
            database: ContextOptions::from_connection_string(&connection_string)?,
            logging: LoggingConfig {
                level: unresolved
                    .logging
                    .level
                    .unwrap_or_else(|| crate::logging::default_log_level().to_string()),
                directory: unresolved.logging.directory,
            },
        })
    }
}
