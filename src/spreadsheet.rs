//! Reading the label spreadsheet.
//!
//! The first worksheet holds one label per row after a header row. Column 0
//! is the label, column 2 a human-readable title and column 6 the manifest
//! URL. xlsx, xls and ods workbooks are accepted.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};

use crate::error::SlidegrabError;
use crate::layout::LabelRecord;

const LABEL_COLUMN: usize = 0;
const TITLE_COLUMN: usize = 2;
const MANIFEST_COLUMN: usize = 6;

/// Read every labelled row of the first worksheet.
///
/// Rows with an empty label are skipped with a warning.
///
/// # Errors
///
/// Returns [`SlidegrabError::Spreadsheet`] if the workbook cannot be opened
/// or has no worksheet.
pub fn read_labels<P: AsRef<Path>>(path: P) -> Result<Vec<LabelRecord>, SlidegrabError> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path).map_err(|error| {
        SlidegrabError::Spreadsheet(format!("cannot open {}: {error}", path.display()))
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| {
            SlidegrabError::Spreadsheet(format!("{} has no worksheet", path.display()))
        })?
        .map_err(|error| SlidegrabError::Spreadsheet(error.to_string()))?;

    let mut records = Vec::new();
    for (row_number, row) in range.rows().enumerate().skip(1) {
        match record_from_row(row) {
            Some(record) => records.push(record),
            None => log::warn!("Skipping row {} without a label", row_number + 1),
        }
    }

    log::debug!("Read {} label(s) from {}", records.len(), path.display());
    Ok(records)
}

/// Build a record from one row, or `None` when the label cell is empty.
pub fn record_from_row(row: &[Data]) -> Option<LabelRecord> {
    let label = row.get(LABEL_COLUMN).and_then(cell_text)?;
    Some(LabelRecord {
        label,
        title: row.get(TITLE_COLUMN).and_then(cell_text),
        manifest_url: row.get(MANIFEST_COLUMN).and_then(cell_text),
    })
}

/// Cell contents as trimmed text. Integral floats print without a fraction
/// so numeric labels such as `2023` stay readable.
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::String(value) | Data::DateTimeIso(value) | Data::DurationIso(value) => {
            value.trim().to_string()
        }
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        Data::Float(value) => value.to_string(),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
