// Run settings
// Loaded from ~/.config/refsync/refsync.toml unless a path is given

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Read { path: PathBuf, message: String },
    /// TOML parse / deserialization error.
    Parse(String),
    /// Parsed but unusable (empty category, bad delimiter, ...).
    Invalid(String),
    /// Config file could not be written.
    Write { path: PathBuf, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, message } => {
                write!(f, "cannot read config {}: {message}", path.display())
            }
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Invalid(msg) => write!(f, "config validation error: {msg}"),
            Self::Write { path, message } => {
                write!(f, "cannot write config {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub sync: SyncSettings,
    pub columns: ColumnSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite database file. No default: it must come from the config file,
    /// `--database` or `REFSYNC_DATABASE`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// How long to wait for another writer before giving up.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Claim category the reference rows are scoped to.
    pub category: String,
    /// Also trim document names when matching (field names always are).
    pub trim_document_names: bool,
    /// Cell values treated as absent (row skipped), e.g. `["NA", "null"]`.
    pub missing_values: Vec<String>,
    /// Input delimiter; sniffed from the file when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            category: "SNF".into(),
            trim_document_names: false,
            missing_values: Vec::new(),
            delimiter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSettings {
    pub document: String,
    pub field: String,
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            document: "document_name".into(),
            field: "field_name".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    pub fn filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Append-only run log.
    pub file: PathBuf,
    pub level: LogLevel,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            file: PathBuf::from("refsync.log"),
            level: LogLevel::Info,
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# refsync configuration

[database]
# SQLite database holding the reference tables (or set REFSYNC_DATABASE)
# path = "/var/lib/refsync/references.db"
busy_timeout_ms = 5000

[sync]
category = "SNF"
# Document names are matched case-insensitively only; set to also trim them
trim_document_names = false
# Cells holding one of these exact values count as empty, so the row is skipped
missing_values = []
# missing_values = ["NA", "N/A", "null", "NaN"]
# delimiter = ","

[columns]
document = "document_name"
field = "field_name"

[log]
file = "refsync.log"
level = "info"
"#;

impl Settings {
    /// Default settings file location.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("refsync")
            .join("refsync.toml")
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load `path` if given (it must exist), otherwise the default location
    /// if present, otherwise built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.category.trim().is_empty() {
            return Err(ConfigError::Invalid("sync.category must not be empty".into()));
        }

        if let Some(d) = self.sync.delimiter {
            if !d.is_ascii() || d == '"' || d == '\n' || d == '\r' {
                return Err(ConfigError::Invalid(format!(
                    "sync.delimiter must be a single ASCII character other than a quote or newline, got {d:?}"
                )));
            }
        }

        if self.columns.document.is_empty() || self.columns.field.is_empty() {
            return Err(ConfigError::Invalid("column names must not be empty".into()));
        }
        if self.columns.document == self.columns.field {
            return Err(ConfigError::Invalid(format!(
                "columns.document and columns.field are both '{}'",
                self.columns.document
            )));
        }

        Ok(())
    }

    /// Write a commented default config, refusing to overwrite.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let write_err = |message: String| ConfigError::Write { path: path.to_path_buf(), message };

        if path.exists() {
            return Err(write_err("file already exists".into()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
            }
        }
        fs::write(path, DEFAULT_CONFIG).map_err(|e| write_err(e.to_string()))
    }

    /// Delimiter as the byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Option<u8> {
        self.sync.delimiter.map(|d| d as u8)
    }
}
