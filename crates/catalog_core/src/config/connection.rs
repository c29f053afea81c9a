//! Connection-string parsing into typed context options.
//!
//! Accepted form is `;`-separated `key=value` pairs with case-insensitive
//! keys, e.g. `Data Source=catalog.db;Mode=ReadWrite;Default Timeout=10`.

use super::{ConfigError, ConfigResult};
use rusqlite::OpenFlags;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MEMORY_DATA_SOURCE: &str = ":memory:";
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Memory,
}

impl Display for DataSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => f.write_str(MEMORY_DATA_SOURCE),
        }
    }
}

/// How the database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Opens for writing and creates the file when missing.
    #[default]
    ReadWriteCreate,
    /// Opens for writing; a missing file is an error.
    ReadWrite,
    /// Opens for reading only; commits fail at the storage layer.
    ReadOnly,
    /// Ignores the data source and opens a private in-memory database.
    Memory,
}

impl OpenMode {
    fn parse(value: &str) -> ConfigResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "readwritecreate" => Ok(Self::ReadWriteCreate),
            "readwrite" => Ok(Self::ReadWrite),
            "readonly" => Ok(Self::ReadOnly),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidMode(value.to_string())),
        }
    }

    pub(crate) fn open_flags(self) -> OpenFlags {
        let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self {
            Self::ReadWriteCreate | Self::Memory => {
                base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
            Self::ReadWrite => base | OpenFlags::SQLITE_OPEN_READ_WRITE,
            Self::ReadOnly => base | OpenFlags::SQLITE_OPEN_READ_ONLY,
        }
    }
}

/// Validated description of how to reach storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    data_source: DataSource,
    mode: OpenMode,
    busy_timeout: Duration,
}

impl ContextOptions {
    /// Options for a database file opened with `ReadWriteCreate`.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            data_source: DataSource::File(path.as_ref().to_path_buf()),
            mode: OpenMode::default(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Options for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            data_source: DataSource::Memory,
            mode: OpenMode::Memory,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Parses a connection string.
    ///
    /// # Errors
    /// - `MissingConnectionString` when the input is blank or has no data source.
    /// - `MalformedSegment` for a segment without `=`.
    /// - `UnknownKey`, `EmptyValue`, `InvalidMode`, `InvalidTimeout` otherwise.
    pub fn from_connection_string(value: &str) -> ConfigResult<Self> {
        let mut data_source = None;
        let mut mode = None;
        let mut busy_timeout = DEFAULT_BUSY_TIMEOUT;

        for segment in value.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (raw_key, raw_value) = segment
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedSegment(segment.to_string()))?;
            let key = normalize_key(raw_key);
            let value = unquote(raw_value.trim());
            if value.is_empty() {
                return Err(ConfigError::EmptyValue(raw_key.trim().to_string()));
            }

            match key.as_str() {
                "datasource" | "filename" => {
                    data_source = Some(if value == MEMORY_DATA_SOURCE {
                        DataSource::Memory
                    } else {
                        DataSource::File(PathBuf::from(value))
                    });
                }
                "mode" => mode = Some(OpenMode::parse(value)?),
                "defaulttimeout" => {
                    let seconds = value
                        .parse::<u64>()
                        .map_err(|_| ConfigError::InvalidTimeout(value.to_string()))?;
                    busy_timeout = Duration::from_secs(seconds);
                }
                _ => return Err(ConfigError::UnknownKey(raw_key.trim().to_string())),
            }
        }

        let data_source = data_source.ok_or(ConfigError::MissingConnectionString)?;
        let mode = match (&data_source, mode) {
            (DataSource::Memory, _) => OpenMode::Memory,
            (DataSource::File(_), Some(OpenMode::Memory)) => OpenMode::Memory,
            (DataSource::File(_), Some(mode)) => mode,
            (DataSource::File(_), None) => OpenMode::default(),
        };

        Ok(Self {
            data_source,
            mode,
            busy_timeout,
        })
    }

    pub fn data_source(&self) -> &DataSource {
        &self.data_source
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Returns whether this opens a private in-memory database.
    pub fn is_memory(&self) -> bool {
        self.mode == OpenMode::Memory || self.data_source == DataSource::Memory
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value)
        .trim()
}
