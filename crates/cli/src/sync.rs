//! `refsync run | check | list | config` - command implementations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use refsync_config::Settings;
use refsync_recon::input::load_csv_file;
use refsync_recon::{ColumnMapping, Reconciler, SyncOptions, SyncSummary};
use refsync_store::{DocumentReference, FieldReference, Store};

use crate::exit_codes::{sync_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_PERSISTENCE};
use crate::report::Reporter;
use crate::{logging, CliError};

/// Overrides from flags and environment, applied on top of the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub category: Option<String>,
    pub trim_document_names: bool,
    pub delimiter: Option<char>,
    pub log_file: Option<PathBuf>,
}

pub struct RunArgs {
    pub input: PathBuf,
    pub dry_run: bool,
    pub json: bool,
    pub quiet: bool,
    pub verbose: bool,
}

fn config_err(msg: impl Into<String>) -> CliError {
    CliError { code: EXIT_CONFIG, message: msg.into(), hint: None }
}

/// Load the config file and apply overrides.
pub fn effective_settings(config: Option<&Path>, overrides: Overrides) -> Result<Settings, CliError> {
    let mut settings = Settings::load(config).map_err(|e| config_err(e.to_string()))?;

    if let Some(database) = overrides.database {
        settings.database.path = Some(database);
    }
    if let Some(category) = overrides.category {
        settings.sync.category = category;
    }
    if overrides.trim_document_names {
        settings.sync.trim_document_names = true;
    }
    if let Some(delimiter) = overrides.delimiter {
        settings.sync.delimiter = Some(delimiter);
    }
    if let Some(log_file) = overrides.log_file {
        settings.log.file = log_file;
    }

    settings.validate().map_err(|e| config_err(e.to_string()))?;
    Ok(settings)
}

fn open_store(settings: &Settings) -> Result<Store, CliError> {
    let path = settings.database.path.as_ref().ok_or_else(|| {
        config_err("no database configured").with_hint(
            "set [database] path in the config file, pass --database, or set REFSYNC_DATABASE",
        )
    })?;

    Store::open(path, Duration::from_millis(settings.database.busy_timeout_ms)).map_err(|e| {
        CliError {
            code: EXIT_PERSISTENCE,
            message: format!("cannot open database {}: {e}", path.display()),
            hint: None,
        }
    })
}

fn sync_options(settings: &Settings, dry_run: bool) -> SyncOptions {
    SyncOptions {
        category: settings.sync.category.clone(),
        trim_document_names: settings.sync.trim_document_names,
        dry_run,
        columns: column_mapping(settings),
        delimiter: settings.delimiter_byte(),
        missing_values: settings.sync.missing_values.clone(),
    }
}

fn column_mapping(settings: &Settings) -> ColumnMapping {
    ColumnMapping {
        document: settings.columns.document.clone(),
        field: settings.columns.field.clone(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError {
        code: EXIT_ERROR,
        message: format!("JSON serialization error: {e}"),
        hint: None,
    })?;
    println!("{json}");
    Ok(())
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn cmd_run(args: RunArgs, config: Option<&Path>, overrides: Overrides) -> Result<(), CliError> {
    let settings = effective_settings(config, overrides)?;

    let level = if args.verbose { log::LevelFilter::Debug } else { settings.log.level.filter() };
    logging::init(&settings.log.file, level, args.verbose)
        .map_err(|e| CliError { code: EXIT_ERROR, message: e, hint: None })?;

    let store = open_store(&settings).map_err(|e| {
        log::error!("{}", e.message);
        e
    })?;

    let mut reconciler = Reconciler::new(store, sync_options(&settings, args.dry_run));
    let mut reporter = Reporter::new(!args.quiet && !args.json);
    let result = reconciler.reconcile_file(&args.input, &mut reporter);

    if let Err(e) = reconciler.into_store().close() {
        log::warn!("closing database: {e}");
    }

    let summary = result.map_err(|e| {
        log::error!("{e}");
        CliError { code: sync_exit_code(&e), message: e.to_string(), hint: None }
    })?;

    if args.json {
        print_json(&summary)?;
    } else if !args.quiet {
        eprintln!();
        eprintln!("{}", summary_line(&summary));
    }
    Ok(())
}

fn summary_line(s: &SyncSummary) -> String {
    format!(
        "{} [{}]: {} rows ({} skipped); documents {} inserted / {} reused, fields {} inserted / {} reused",
        s.outcome,
        s.category,
        s.rows_read,
        s.rows_skipped,
        s.documents_inserted,
        s.documents_reused,
        s.fields_inserted,
        s.fields_reused,
    )
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub rows_read: usize,
    pub rows_complete: usize,
    pub skipped_lines: Vec<u64>,
}

pub fn cmd_check(
    input: &Path,
    json: bool,
    config: Option<&Path>,
    overrides: Overrides,
) -> Result<(), CliError> {
    let settings = effective_settings(config, overrides)?;
    let options = sync_options(&settings, true);
    let rows = load_csv_file(input, &options.columns, options.delimiter)
        .map_err(|e| CliError { code: sync_exit_code(&e), message: e.to_string(), hint: None })?;

    let report = CheckReport {
        rows_read: rows.len(),
        rows_complete: rows.iter().filter(|r| options.accepts(r)).count(),
        skipped_lines: rows.iter().filter(|r| !options.accepts(r)).map(|r| r.line).collect(),
    };

    if json {
        return print_json(&report);
    }

    eprintln!(
        "{}: {} rows, {} to reconcile, {} skipped",
        input.display(),
        report.rows_read,
        report.rows_complete,
        report.skipped_lines.len(),
    );
    if !report.skipped_lines.is_empty() {
        let lines: Vec<String> = report.skipped_lines.iter().map(|l| l.to_string()).collect();
        eprintln!("skipped lines: {}", lines.join(", "));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct DocumentListing {
    pub id: i64,
    pub name: String,
    pub fields: Vec<FieldListing>,
}

#[derive(Debug, Serialize)]
pub struct FieldListing {
    pub id: i64,
    pub name: String,
}

/// Group fields under their documents, both in id order.
pub fn group_fields(docs: Vec<DocumentReference>, fields: Vec<FieldReference>) -> Vec<DocumentListing> {
    let mut by_document: BTreeMap<i64, Vec<FieldListing>> = BTreeMap::new();
    for field in fields {
        if let Some(document_id) = field.document_id {
            by_document
                .entry(document_id)
                .or_default()
                .push(FieldListing { id: field.id, name: field.name });
        }
    }

    docs.into_iter()
        .map(|doc| DocumentListing {
            fields: by_document.remove(&doc.id).unwrap_or_default(),
            id: doc.id,
            name: doc.name,
        })
        .collect()
}

pub fn cmd_list(json: bool, config: Option<&Path>, overrides: Overrides) -> Result<(), CliError> {
    let settings = effective_settings(config, overrides)?;
    let store = open_store(&settings)?;
    let category = settings.sync.category.as_str();

    let persistence_err = |e: refsync_store::StoreError| CliError {
        code: EXIT_PERSISTENCE,
        message: e.to_string(),
        hint: None,
    };
    let docs = store.documents(category).map_err(persistence_err)?;
    let fields = store.fields(category).map_err(persistence_err)?;
    let listing = group_fields(docs, fields);

    if json {
        return print_json(&listing);
    }

    if listing.is_empty() {
        eprintln!("no documents in category {category}");
    }
    for doc in &listing {
        println!("{} [{}]", doc.name, doc.id);
        for field in &doc.fields {
            println!("  {} [{}]", field.name, field.id);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

pub fn cmd_config_init(path: Option<PathBuf>) -> Result<(), CliError> {
    let path = path.unwrap_or_else(Settings::config_path);
    Settings::write_default(&path).map_err(|e| config_err(e.to_string()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

pub fn cmd_config_show(config: Option<&Path>, overrides: Overrides) -> Result<(), CliError> {
    let settings = effective_settings(config, overrides)?;
    let text = toml::to_string_pretty(&settings)
        .map_err(|e| CliError { code: EXIT_ERROR, message: e.to_string(), hint: None })?;
    print!("{text}");
    Ok(())
}
