use crate::core::record::DesignRecord;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid number '{value}' in column '{column}' of '{path}' (row {row})")]
    InvalidNumber {
        path: String,
        row: usize,
        column: String,
        value: String,
    },
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> TableError + '_ {
    move |source| TableError::Csv {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

/// Writes records as CSV with the given column order.
///
/// A record missing a column leaves that cell empty. Columns not listed are not written.
pub fn write_records(
    path: &Path,
    columns: &[String],
    records: &[DesignRecord],
) -> Result<(), TableError> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error(path))?;
    writer.write_record(columns).map_err(csv_error(path))?;

    for record in records {
        let row = columns.iter().map(|column| match record.get(column) {
            Some(value) => value.to_string(),
            None => String::new(),
        });
        writer.write_record(row).map_err(csv_error(path))?;
    }

    writer.flush().map_err(|source| TableError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    debug!(path = %path.display(), rows = records.len(), "Design table written.");
    Ok(())
}

/// Reads a CSV design table. Empty cells are left out of the record.
pub fn read_records(path: &Path) -> Result<Vec<DesignRecord>, TableError> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_error(path))?;
    let headers = reader.headers().map_err(csv_error(path))?.clone();

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let row_data = result.map_err(csv_error(path))?;
        let mut record = DesignRecord::with_capacity(headers.len());
        for (column, cell) in headers.iter().zip(row_data.iter()) {
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            let value = cell
                .parse::<f64>()
                .map_err(|_| TableError::InvalidNumber {
                    path: path.to_string_lossy().to_string(),
                    row: row + 1,
                    column: column.to_string(),
                    value: cell.to_string(),
                })?;
            record.insert(column, value);
        }
        records.push(record);
    }
    Ok(records)
}
