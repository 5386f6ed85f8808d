//! `refsync-store` - SQLite persistence for the document/field reference tables.
//!
//! Owns the schema and every SQL statement. Callers open a [`Store`], begin a
//! [`StoreTx`] and commit or roll it back; nothing is written outside a
//! transaction.

pub mod error;
pub mod model;
pub mod sqlite;

pub use error::StoreError;
pub use model::{DocumentReference, FieldReference, Upserted};
pub use sqlite::{Store, StoreTx};
