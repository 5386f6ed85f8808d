use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One (document, field) pairing read from the input file.
///
/// An absent cell is represented as an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    /// 1-based record number in the file; the header is line 1.
    pub line: u64,
    pub document_name: String,
    pub field_name: String,
}

impl InputRow {
    pub fn new(line: u64, document_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            line,
            document_name: document_name.into(),
            field_name: field_name.into(),
        }
    }

    /// Both names present. Incomplete rows are skipped without error.
    pub fn is_complete(&self) -> bool {
        !self.document_name.is_empty() && !self.field_name.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Every insert of the run is durable.
    Committed,
    /// The run was rolled back on request; counts describe what it would
    /// have written.
    DryRun,
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Committed => write!(f, "committed"),
            Self::DryRun => write!(f, "dry_run"),
        }
    }
}

/// Result of a run that reached its end. Failed runs produce an error
/// instead; there is no partial summary.
///
/// `*_reused` count rows whose document or field already existed, so a
/// document shared by several rows is counted once per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub category: String,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub rows_processed: usize,
    pub documents_inserted: usize,
    pub documents_reused: usize,
    pub fields_inserted: usize,
    pub fields_reused: usize,
    pub outcome: SyncOutcome,
}

impl SyncSummary {
    pub(crate) fn empty(category: &str, outcome: SyncOutcome) -> Self {
        Self {
            category: category.to_string(),
            rows_read: 0,
            rows_skipped: 0,
            rows_processed: 0,
            documents_inserted: 0,
            documents_reused: 0,
            fields_inserted: 0,
            fields_reused: 0,
            outcome,
        }
    }

    pub fn inserted(&self) -> usize {
        self.documents_inserted + self.fields_inserted
    }
}
