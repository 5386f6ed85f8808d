// Progress events emitted while a run executes

use std::fmt;
use std::path::PathBuf;

/// Everything a run reports, in the order it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    RunStarted { at: String, category: String },
    InputLoaded { path: PathBuf, rows_read: usize, rows_skipped: usize },
    RowStarted { line: u64, document: String, field: String },
    DocumentFound { id: i64, name: String },
    DocumentInserted { id: i64, name: String },
    FieldFound { id: i64, name: String, document: String },
    FieldInserted { id: i64, name: String, document: String },
    Committed,
    DryRunRolledBack,
    RolledBack { error: String },
    SessionClosed,
}

impl SyncEvent {
    pub fn level(&self) -> log::Level {
        match self {
            Self::RolledBack { .. } => log::Level::Error,
            _ => log::Level::Info,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunStarted { at, category } => {
                write!(f, "Starting new run at: {at} (category {category})")
            }
            Self::InputLoaded { path, rows_read, rows_skipped } => write!(
                f,
                "Loaded {}: {rows_read} rows, {rows_skipped} skipped (missing document or field name)",
                path.display()
            ),
            Self::RowStarted { line, document, field } => {
                write!(f, "Processing line {line}: document '{document}', field '{field}'")
            }
            Self::DocumentFound { id, name } => {
                write!(f, "Found existing document '{name}' with id {id}")
            }
            Self::DocumentInserted { id, name } => {
                write!(f, "Inserted new document '{name}' with id {id}")
            }
            Self::FieldFound { id, name, document } => {
                write!(f, "Field '{name}' already exists for document '{document}' with id {id}")
            }
            Self::FieldInserted { id, name, document } => {
                write!(f, "Inserted field '{name}' for document '{document}' with id {id}")
            }
            Self::Committed => write!(f, "Transaction committed successfully"),
            Self::DryRunRolledBack => write!(f, "Dry run: transaction rolled back, nothing written"),
            Self::RolledBack { error } => {
                write!(f, "Error occurred: {error}. Rolling back the transaction")
            }
            Self::SessionClosed => write!(f, "Session closed"),
        }
    }
}

/// Receiver for run events.
pub trait EventSink {
    fn emit(&mut self, event: &SyncEvent);
}

/// Forwards every event to the `log` facade at the event's level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: &SyncEvent) {
        log::log!(event.level(), "{event}");
    }
}

/// Collects events, for callers that inspect them afterwards.
impl EventSink for Vec<SyncEvent> {
    fn emit(&mut self, event: &SyncEvent) {
        self.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_is_reported_at_error_level() {
        let event = SyncEvent::RolledBack { error: "disk I/O error".into() };
        assert_eq!(event.level(), log::Level::Error);
        assert!(event.to_string().contains("disk I/O error"));
        assert_eq!(SyncEvent::Committed.level(), log::Level::Info);
    }

    #[test]
    fn messages_carry_identity() {
        let event = SyncEvent::FieldInserted {
            id: 7,
            name: "DOB".into(),
            document: "Form A".into(),
        };
        assert_eq!(event.to_string(), "Inserted field 'DOB' for document 'Form A' with id 7");
    }
}
