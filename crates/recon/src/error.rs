use std::fmt;

use refsync_store::StoreError;

#[derive(Debug)]
pub enum SyncError {
    /// Input file unreadable or not valid CSV.
    Input(String),
    /// A required column is absent from the header row.
    MissingColumn { column: String },
    /// Any failure talking to the database. The run's transaction has been
    /// rolled back by the time this is returned.
    Persistence(StoreError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(msg) => write!(f, "input error: {msg}"),
            Self::MissingColumn { column } => write!(f, "input error: missing column '{column}'"),
            Self::Persistence(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        Self::Persistence(e)
    }
}
