//! `refsync-recon` - Get-or-create reconciliation of reference rows.
//!
//! Reads (document, field) pairs from a delimited file and makes sure each
//! pair exists in the reference tables, reusing rows that are already there.
//! A run is one transaction: it commits as a whole or not at all.

pub mod engine;
pub mod error;
pub mod event;
pub mod input;
pub mod model;

pub use engine::{Reconciler, SyncOptions};
pub use error::SyncError;
pub use event::{EventSink, LogSink, SyncEvent};
pub use input::ColumnMapping;
pub use model::{InputRow, SyncOutcome, SyncSummary};
