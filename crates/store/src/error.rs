use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    /// Any error reported by SQLite (connect, query, insert, commit).
    Sqlite(rusqlite::Error),
    /// Filesystem error preparing the database location.
    Io(String),
    /// An insert was ignored by a uniqueness constraint but the conflicting
    /// row could not be read back.
    Conflict(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "database error: {e}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Conflict(msg) => write!(f, "unresolved conflict: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}
