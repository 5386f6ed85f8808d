// Delimited input loading

use std::path::Path;

use encoding_rs::Encoding;

use crate::error::SyncError;
use crate::model::InputRow;

/// Header names of the two columns the reconciler reads. Other columns are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub document: String,
    pub field: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            document: "document_name".into(),
            field: "field_name".into(),
        }
    }
}

/// Read `path` and parse every data row. `delimiter = None` sniffs it from
/// the header line.
pub fn load_csv_file(
    path: &Path,
    columns: &ColumnMapping,
    delimiter: Option<u8>,
) -> Result<Vec<InputRow>, SyncError> {
    let content = read_input(path)?;
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(&content, columns));
    load_csv_rows(&content, columns, delimiter)
}

/// Parse CSV text into rows, keeping incomplete ones so callers can count
/// what gets skipped.
pub fn load_csv_rows(
    csv_data: &str,
    columns: &ColumnMapping,
    delimiter: u8,
) -> Result<Vec<InputRow>, SyncError> {
    let csv_data = csv_data.strip_prefix('\u{feff}').unwrap_or(csv_data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SyncError::Input(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let idx = |name: &str| -> Result<usize, SyncError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SyncError::MissingColumn { column: name.into() })
    };

    let document_idx = idx(&columns.document)?;
    let field_idx = idx(&columns.field)?;

    let mut rows = Vec::new();
    for (n, record) in reader.records().enumerate() {
        let record = record.map_err(|e| SyncError::Input(e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(n as u64 + 2);

        rows.push(InputRow {
            line,
            document_name: record.get(document_idx).unwrap_or("").to_string(),
            field_name: record.get(field_idx).unwrap_or("").to_string(),
        });
    }

    Ok(rows)
}

/// Read the file as text. A BOM picks the encoding; otherwise UTF-8 is
/// expected, with Windows-1252 as the fallback for spreadsheet exports.
fn read_input(path: &Path) -> Result<String, SyncError> {
    let bytes = std::fs::read(path)
        .map_err(|e| SyncError::Input(format!("cannot read {}: {e}", path.display())))?;

    let encoding = match Encoding::for_bom(&bytes) {
        Some((encoding, _)) => encoding,
        None if std::str::from_utf8(&bytes).is_ok() => encoding_rs::UTF_8,
        None => {
            log::debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            encoding_rs::WINDOWS_1252
        }
    };
    let (text, _, _) = encoding.decode(&bytes);
    Ok(text.into_owned())
}

/// Guess the delimiter from the header line alone. A candidate that splits
/// out both mapped columns wins; otherwise the one giving the most fields.
/// Defaults to comma.
fn sniff_delimiter(content: &str, columns: &ColumnMapping) -> u8 {
    let header = content.trim_start_matches('\u{feff}').lines().next().unwrap_or("");

    let mut best = (b',', 1);
    for delim in [b',', b'\t', b';', b'|'] {
        let fields: Vec<String> = csv::ReaderBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .from_reader(header.as_bytes())
            .records()
            .next()
            .and_then(|r| r.ok())
            .map(|r| r.iter().map(|f| f.trim().to_string()).collect())
            .unwrap_or_default();

        if fields.iter().any(|f| *f == columns.document) && fields.iter().any(|f| *f == columns.field) {
            return delim;
        }
        if fields.len() > best.1 {
            best = (delim, fields.len());
        }
    }
    best.0
}
