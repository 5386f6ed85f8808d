use std::path::Path;

use refsync_store::{Store, StoreTx};

use crate::error::SyncError;
use crate::event::{EventSink, SyncEvent};
use crate::input::{load_csv_file, ColumnMapping};
use crate::model::{InputRow, SyncOutcome, SyncSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Claim category every lookup and insert is scoped to.
    pub category: String,
    /// Trim document names before matching and storing them. Off by
    /// default: historically only field names are trimmed.
    pub trim_document_names: bool,
    /// Run the full pipeline, then roll back instead of committing.
    pub dry_run: bool,
    pub columns: ColumnMapping,
    /// `None` sniffs the delimiter from the file.
    pub delimiter: Option<u8>,
    /// Cell values that count as absent, such as `NA` or `null`. Compared
    /// exactly. Empty by default, so every non-empty cell is a name.
    pub missing_values: Vec<String>,
}

impl SyncOptions {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            trim_document_names: false,
            dry_run: false,
            columns: ColumnMapping::default(),
            delimiter: None,
            missing_values: Vec::new(),
        }
    }

    /// Whether a run processes `row`. Rejected rows are skipped without
    /// error.
    pub fn accepts(&self, row: &InputRow) -> bool {
        row.is_complete()
            && !(self.trim_document_names && row.document_name.trim().is_empty())
            && !self.is_missing(&row.document_name)
            && !self.is_missing(&row.field_name)
    }

    fn is_missing(&self, value: &str) -> bool {
        self.missing_values.iter().any(|m| m == value)
    }
}

/// Ensures every input (document, field) pair exists in the reference
/// tables, inside one transaction per run.
pub struct Reconciler {
    store: Store,
    options: SyncOptions,
}

impl Reconciler {
    pub fn new(store: Store, options: SyncOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    /// Load `path` and reconcile its rows. Input errors are returned before
    /// any transaction is opened; the session is still reported closed.
    pub fn reconcile_file(
        &mut self,
        path: &Path,
        sink: &mut dyn EventSink,
    ) -> Result<SyncSummary, SyncError> {
        self.announce(sink);
        let rows = match load_csv_file(path, &self.options.columns, self.options.delimiter) {
            Ok(rows) => rows,
            Err(e) => {
                sink.emit(&SyncEvent::SessionClosed);
                return Err(e);
            }
        };
        sink.emit(&SyncEvent::InputLoaded {
            path: path.to_path_buf(),
            rows_read: rows.len(),
            rows_skipped: rows.iter().filter(|r| !self.options.accepts(r)).count(),
        });
        self.run(&rows, sink)
    }

    /// Reconcile rows that were loaded elsewhere.
    pub fn reconcile_rows(
        &mut self,
        rows: &[InputRow],
        sink: &mut dyn EventSink,
    ) -> Result<SyncSummary, SyncError> {
        self.announce(sink);
        self.run(rows, sink)
    }

    fn announce(&self, sink: &mut dyn EventSink) {
        sink.emit(&SyncEvent::RunStarted {
            at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            category: self.options.category.clone(),
        });
    }

    fn run(&mut self, rows: &[InputRow], sink: &mut dyn EventSink) -> Result<SyncSummary, SyncError> {
        let outcome = if self.options.dry_run { SyncOutcome::DryRun } else { SyncOutcome::Committed };
        let mut summary = SyncSummary::empty(&self.options.category, outcome);
        summary.rows_read = rows.len();

        let accepted: Vec<&InputRow> = rows
            .iter()
            .filter(|row| {
                let keep = self.options.accepts(row);
                if !keep {
                    log::debug!("skipping line {}: missing document or field name", row.line);
                }
                keep
            })
            .collect();
        summary.rows_skipped = rows.len() - accepted.len();

        let tx = match self.store.begin() {
            Ok(tx) => tx,
            Err(e) => {
                sink.emit(&SyncEvent::RolledBack { error: e.to_string() });
                sink.emit(&SyncEvent::SessionClosed);
                return Err(e.into());
            }
        };

        let applied = apply_rows(&tx, &self.options, &accepted, &mut summary, sink);

        let finished = match applied {
            Ok(()) if self.options.dry_run => tx
                .rollback()
                .map(|()| sink.emit(&SyncEvent::DryRunRolledBack)),
            // A failed commit has already rolled back when the transaction
            // was dropped inside `commit`.
            Ok(()) => tx.commit().map(|()| sink.emit(&SyncEvent::Committed)),
            Err(e) => {
                sink.emit(&SyncEvent::RolledBack { error: e.to_string() });
                if let Err(rollback) = tx.rollback() {
                    log::warn!("rollback failed: {rollback}");
                }
                sink.emit(&SyncEvent::SessionClosed);
                return Err(e);
            }
        };

        let result = match finished {
            Ok(()) => Ok(summary),
            Err(e) => {
                sink.emit(&SyncEvent::RolledBack { error: e.to_string() });
                Err(e.into())
            }
        };
        sink.emit(&SyncEvent::SessionClosed);
        result
    }
}

fn apply_rows(
    tx: &StoreTx<'_>,
    options: &SyncOptions,
    rows: &[&InputRow],
    summary: &mut SyncSummary,
    sink: &mut dyn EventSink,
) -> Result<(), SyncError> {
    for row in rows {
        apply_row(tx, options, row, summary, sink)?;
    }
    Ok(())
}

/// Resolve-or-create the row's document, then its field.
fn apply_row(
    tx: &StoreTx<'_>,
    options: &SyncOptions,
    row: &InputRow,
    summary: &mut SyncSummary,
    sink: &mut dyn EventSink,
) -> Result<(), SyncError> {
    sink.emit(&SyncEvent::RowStarted {
        line: row.line,
        document: row.document_name.clone(),
        field: row.field_name.clone(),
    });

    let category = options.category.as_str();
    let document_name = if options.trim_document_names {
        row.document_name.trim()
    } else {
        row.document_name.as_str()
    };

    let existing = tx.find_document(category, document_name, options.trim_document_names)?;
    let document_id = match existing {
        Some(doc) => {
            summary.documents_reused += 1;
            sink.emit(&SyncEvent::DocumentFound { id: doc.id, name: doc.name });
            doc.id
        }
        None => {
            let doc = tx.insert_document(category, document_name)?;
            if doc.inserted {
                summary.documents_inserted += 1;
                sink.emit(&SyncEvent::DocumentInserted { id: doc.id, name: document_name.into() });
            } else {
                summary.documents_reused += 1;
                sink.emit(&SyncEvent::DocumentFound { id: doc.id, name: document_name.into() });
            }
            doc.id
        }
    };

    let field_name = row.field_name.as_str();
    match tx.find_field(document_id, category, field_name)? {
        Some(field) => {
            summary.fields_reused += 1;
            sink.emit(&SyncEvent::FieldFound {
                id: field.id,
                name: field.name,
                document: document_name.into(),
            });
        }
        None => {
            let field = tx.insert_field(document_id, category, field_name)?;
            let event = if field.inserted {
                summary.fields_inserted += 1;
                SyncEvent::FieldInserted {
                    id: field.id,
                    name: field_name.into(),
                    document: document_name.into(),
                }
            } else {
                summary.fields_reused += 1;
                SyncEvent::FieldFound {
                    id: field.id,
                    name: field_name.into(),
                    document: document_name.into(),
                }
            };
            sink.emit(&event);
        }
    }

    summary.rows_processed += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconciler(options: SyncOptions) -> Reconciler {
        Reconciler::new(Store::open_in_memory().unwrap(), options)
    }

    fn snf() -> Reconciler {
        reconciler(SyncOptions::new("SNF"))
    }

    fn rows(pairs: &[(&str, &str)]) -> Vec<InputRow> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (doc, field))| InputRow::new(i as u64 + 2, *doc, *field))
            .collect()
    }

    fn fail_on_field(r: &Reconciler, name: &str) {
        r.store()
            .connection()
            .execute_batch(&format!(
                "CREATE TRIGGER fail_field BEFORE INSERT ON field_reference \
                 WHEN NEW.name = '{name}' BEGIN SELECT RAISE(ABORT, 'simulated failure'); END;"
            ))
            .unwrap();
    }

    #[test]
    fn scenario_empty_store() {
        let mut r = snf();
        let input = rows(&[("Form A", "Name"), ("Form A", "DOB"), ("", "X")]);
        let summary = r.reconcile_rows(&input, &mut Vec::new()).unwrap();

        assert_eq!(summary.rows_read, 3);
        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(summary.rows_processed, 2);
        assert_eq!(summary.documents_inserted, 1);
        assert_eq!(summary.documents_reused, 1);
        assert_eq!(summary.fields_inserted, 2);
        assert_eq!(summary.outcome, SyncOutcome::Committed);

        let docs = r.store().documents("SNF").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "Form A");
        let fields = r.store().fields("SNF").unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Name", "DOB"]);
        assert!(fields.iter().all(|f| f.document_id == Some(docs[0].id)));
    }

    #[test]
    fn second_run_reuses_everything() {
        let mut r = snf();
        let input = rows(&[("Form A", "Name"), ("Form B", "DOB")]);
        r.reconcile_rows(&input, &mut Vec::new()).unwrap();
        let again = r.reconcile_rows(&input, &mut Vec::new()).unwrap();

        assert_eq!(again.inserted(), 0);
        assert_eq!(again.documents_reused, 2);
        assert_eq!(again.fields_reused, 2);
        assert_eq!(r.store().documents("SNF").unwrap().len(), 2);
        assert_eq!(r.store().fields("SNF").unwrap().len(), 2);
    }

    #[test]
    fn document_match_ignores_case() {
        let mut r = snf();
        r.reconcile_rows(&rows(&[("form a", "Name")]), &mut Vec::new()).unwrap();
        let summary = r.reconcile_rows(&rows(&[("Form A", "Name")]), &mut Vec::new()).unwrap();

        assert_eq!(summary.documents_inserted, 0);
        assert_eq!(summary.fields_inserted, 0);
        assert_eq!(r.store().documents("SNF").unwrap()[0].name, "form a");
    }

    #[test]
    fn field_match_trims_and_ignores_case() {
        let mut r = snf();
        r.reconcile_rows(&rows(&[("Form A", "diagnosis")]), &mut Vec::new()).unwrap();
        let summary = r
            .reconcile_rows(&rows(&[("Form A", " Diagnosis ")]), &mut Vec::new())
            .unwrap();

        assert_eq!(summary.fields_inserted, 0);
        assert_eq!(summary.fields_reused, 1);
        assert_eq!(r.store().fields("SNF").unwrap().len(), 1);
    }

    #[test]
    fn document_whitespace_is_significant_by_default() {
        let mut r = snf();
        let summary = r
            .reconcile_rows(&rows(&[("Form A", "Name"), ("Form A ", "Name")]), &mut Vec::new())
            .unwrap();

        assert_eq!(summary.documents_inserted, 2);
        assert_eq!(r.store().documents("SNF").unwrap().len(), 2);
    }

    #[test]
    fn trim_document_names_option_stores_and_matches_trimmed() {
        let mut options = SyncOptions::new("SNF");
        options.trim_document_names = true;
        let mut r = reconciler(options);
        let summary = r
            .reconcile_rows(
                &rows(&[(" Form A", "Name"), ("form a  ", "DOB"), ("   ", "X")]),
                &mut Vec::new(),
            )
            .unwrap();

        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(summary.documents_inserted, 1);
        let docs = r.store().documents("SNF").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "Form A");
    }

    #[test]
    fn categories_do_not_share_rows() {
        let mut r = snf();
        r.reconcile_rows(&rows(&[("Form A", "Name")]), &mut Vec::new()).unwrap();

        let mut other = Reconciler::new(r.into_store(), SyncOptions::new("IRF"));
        let summary = other.reconcile_rows(&rows(&[("Form A", "Name")]), &mut Vec::new()).unwrap();

        assert_eq!(summary.documents_inserted, 1);
        assert_eq!(summary.fields_inserted, 1);
        assert_eq!(other.store().documents("IRF").unwrap().len(), 1);
        assert_eq!(other.store().documents("SNF").unwrap().len(), 1);
        assert_eq!(other.store().fields("IRF").unwrap()[0].category, "IRF");
    }

    #[test]
    fn dry_run_writes_nothing() {
        let mut options = SyncOptions::new("SNF");
        options.dry_run = true;
        let mut r = reconciler(options);
        let mut events = Vec::new();
        let summary = r
            .reconcile_rows(&rows(&[("Form A", "Name"), ("Form A", "DOB")]), &mut events)
            .unwrap();

        assert_eq!(summary.outcome, SyncOutcome::DryRun);
        assert_eq!(summary.documents_inserted, 1);
        assert_eq!(summary.fields_inserted, 2);
        assert!(r.store().documents("SNF").unwrap().is_empty());
        assert!(events.contains(&SyncEvent::DryRunRolledBack));
        assert!(!events.contains(&SyncEvent::Committed));
    }

    #[test]
    fn failure_midway_rolls_back_whole_run() {
        let mut r = snf();
        r.reconcile_rows(&rows(&[("Form Z", "Kept")]), &mut Vec::new()).unwrap();
        fail_on_field(&r, "BOOM");

        let mut events = Vec::new();
        let err = r
            .reconcile_rows(
                &rows(&[("Form A", "Name"), ("Form B", "BOOM"), ("Form C", "Never")]),
                &mut events,
            )
            .unwrap_err();

        assert!(matches!(err, SyncError::Persistence(_)));
        assert!(err.to_string().contains("simulated failure"));

        let docs = r.store().documents("SNF").unwrap();
        assert_eq!(docs.len(), 1, "only the earlier run's document remains");
        assert_eq!(docs[0].name, "Form Z");
        assert_eq!(r.store().fields("SNF").unwrap().len(), 1);

        // Processing stopped at the failing row.
        assert!(!events.iter().any(|e| matches!(e, SyncEvent::RowStarted { line: 4, .. })));
        assert!(matches!(events[events.len() - 2], SyncEvent::RolledBack { .. }));
        assert_eq!(events.last(), Some(&SyncEvent::SessionClosed));
    }

    #[test]
    fn events_follow_row_pipeline() {
        let mut r = snf();
        let mut events = Vec::new();
        r.reconcile_rows(&rows(&[("Form A", "Name"), ("FORM A", "name ")]), &mut events)
            .unwrap();

        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                SyncEvent::RunStarted { .. } => "start",
                SyncEvent::RowStarted { .. } => "row",
                SyncEvent::DocumentInserted { .. } => "doc+",
                SyncEvent::DocumentFound { .. } => "doc=",
                SyncEvent::FieldInserted { .. } => "field+",
                SyncEvent::FieldFound { .. } => "field=",
                SyncEvent::Committed => "commit",
                SyncEvent::SessionClosed => "closed",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            ["start", "row", "doc+", "field+", "row", "doc=", "field=", "commit", "closed"]
        );
    }

    #[test]
    fn skipped_rows_emit_no_row_events() {
        let mut r = snf();
        let mut events = Vec::new();
        let summary = r
            .reconcile_rows(&rows(&[("", "X"), ("Form A", "")]), &mut events)
            .unwrap();

        assert_eq!(summary.rows_skipped, 2);
        assert_eq!(summary.inserted(), 0);
        assert!(!events.iter().any(|e| matches!(e, SyncEvent::RowStarted { .. })));
        assert!(r.store().documents("SNF").unwrap().is_empty());
    }

    #[test]
    fn accented_names_are_reused_across_case() {
        let mut r = snf();
        r.reconcile_rows(&rows(&[("évaluation", "Name")]), &mut Vec::new()).unwrap();
        let again = r
            .reconcile_rows(&rows(&[("ÉVALUATION", "NAME"), ("Évaluation", " name ")]), &mut Vec::new())
            .unwrap();

        assert_eq!(again.documents_inserted, 0);
        assert_eq!(again.fields_inserted, 0);
        assert_eq!(r.store().documents("SNF").unwrap().len(), 1);
        assert_eq!(r.store().fields("SNF").unwrap().len(), 1);
    }

    #[test]
    fn options_reject_rows_a_run_would_skip() {
        let mut options = SyncOptions::new("SNF");
        let blank_document = InputRow::new(2, "   ", "X");
        assert!(options.accepts(&blank_document));

        options.trim_document_names = true;
        assert!(!options.accepts(&blank_document));
        assert!(!options.accepts(&InputRow::new(3, "Form A", "")));
        assert!(options.accepts(&InputRow::new(4, " Form A ", "Name")));
    }

    #[test]
    fn trimmed_blank_document_is_skipped_by_run() {
        let mut options = SyncOptions::new("SNF");
        options.trim_document_names = true;
        let mut r = reconciler(options);
        let summary = r
            .reconcile_rows(&rows(&[("   ", "X"), ("Form A", "Name")]), &mut Vec::new())
            .unwrap();

        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(summary.rows_processed, 1);
    }

    #[test]
    fn missing_value_markers_are_skipped() {
        let mut options = SyncOptions::new("SNF");
        options.missing_values = vec!["NA".into(), "null".into()];
        assert!(!options.accepts(&InputRow::new(2, "NA", "Name")));
        assert!(!options.accepts(&InputRow::new(3, "Form A", "null")));
        assert!(options.accepts(&InputRow::new(4, "Form A", "NULL")));

        let mut r = reconciler(options);
        let summary = r
            .reconcile_rows(&rows(&[("NA", "Name"), ("Form A", "null"), ("Form A", "N/A")]), &mut Vec::new())
            .unwrap();
        assert_eq!(summary.rows_skipped, 2);
        assert_eq!(summary.fields_inserted, 1);
        assert_eq!(r.store().fields("SNF").unwrap()[0].name, "N/A");
    }

    #[test]
    fn markers_are_literal_names_by_default() {
        let mut r = snf();
        let summary = r.reconcile_rows(&rows(&[("NA", "null")]), &mut Vec::new()).unwrap();
        assert_eq!(summary.rows_skipped, 0);
        assert_eq!(summary.inserted(), 2);
    }

    #[test]
    fn unreadable_input_still_closes_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = snf();
        let mut events = Vec::new();
        let err = r.reconcile_file(&dir.path().join("absent.csv"), &mut events).unwrap_err();

        assert!(matches!(err, SyncError::Input(_)));
        assert!(matches!(events.first(), Some(SyncEvent::RunStarted { .. })));
        assert_eq!(events.last(), Some(&SyncEvent::SessionClosed));
        assert!(!events.iter().any(|e| matches!(e, SyncEvent::RolledBack { .. })));
    }
}
