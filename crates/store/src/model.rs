use serde::Serialize;

/// A document row, unique per (lowercase name, category).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReference {
    pub id: i64,
    pub category: String,
    pub name: String,
}

/// A field row, unique per (document, lowercase trimmed name, category).
///
/// `document_id` is nullable in the schema; rows written by the reconciler
/// always carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldReference {
    pub id: i64,
    pub document_id: Option<i64>,
    pub name: String,
    pub category: String,
}

/// Result of an insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    /// False when a uniqueness constraint turned the insert into a no-op and
    /// the id belongs to the row that was already there.
    pub inserted: bool,
}
