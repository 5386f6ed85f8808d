// Configuration loading

pub mod settings;

pub use settings::{
    ColumnSettings, ConfigError, DatabaseSettings, LogLevel, LogSettings, Settings, SyncSettings,
};
