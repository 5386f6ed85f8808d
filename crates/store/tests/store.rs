use std::time::Duration;

use refsync_store::Store;

fn open(path: &std::path::Path) -> Store {
    Store::open(path, Duration::from_millis(200)).unwrap()
}

#[test]
fn committed_rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("nested/refs.db");

    {
        let mut store = open(&db);
        let tx = store.begin().unwrap();
        let doc = tx.insert_document("SNF", "Form A").unwrap();
        tx.insert_field(doc.id, "SNF", "Name").unwrap();
        tx.commit().unwrap();
        store.close().unwrap();
    }

    let store = open(&db);
    let docs = store.documents("SNF").unwrap();
    let fields = store.fields("SNF").unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].document_id, Some(docs[0].id));
}

#[test]
fn reopening_keeps_schema_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("refs.db");
    open(&db).close().unwrap();
    open(&db).close().unwrap();
}

#[test]
fn racing_insert_from_other_connection_resolves_to_existing_row() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("refs.db");
    let mut first = open(&db);
    let mut second = open(&db);

    // Second run checked before the first one committed and saw nothing.
    let winner = {
        let tx = first.begin().unwrap();
        let doc = tx.insert_document("SNF", "Form A").unwrap();
        tx.commit().unwrap();
        doc
    };

    let tx = second.begin().unwrap();
    let loser = tx.insert_document("SNF", "form a").unwrap();
    assert!(!loser.inserted);
    assert_eq!(loser.id, winner.id);
    tx.commit().unwrap();

    assert_eq!(second.documents("SNF").unwrap().len(), 1);
}

#[test]
fn busy_writer_times_out_instead_of_interleaving() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("refs.db");
    let mut first = open(&db);
    let mut second = open(&db);

    let _held = first.begin().unwrap();
    assert!(second.begin().is_err());
}

#[test]
fn accented_case_variants_collapse_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("refs.db");

    {
        let mut store = open(&db);
        let tx = store.begin().unwrap();
        let doc = tx.insert_document("SNF", "évaluation").unwrap();
        tx.insert_field(doc.id, "SNF", "Numéro").unwrap();
        tx.commit().unwrap();
        store.close().unwrap();
    }

    let mut store = open(&db);
    let tx = store.begin().unwrap();
    let doc = tx.insert_document("SNF", "ÉVALUATION").unwrap();
    assert!(!doc.inserted);
    let field = tx.insert_field(doc.id, "SNF", "NUMÉRO").unwrap();
    assert!(!field.inserted);
    tx.commit().unwrap();

    assert_eq!(store.documents("SNF").unwrap().len(), 1);
    assert_eq!(store.fields("SNF").unwrap().len(), 1);
}
