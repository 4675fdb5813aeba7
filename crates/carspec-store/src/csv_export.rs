use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use carspec_core::error::AppError;
use carspec_core::models::SaveReport;

pub(crate) fn csv_error(path: &Path, e: csv::Error) -> AppError {
    AppError::CsvError(format!("{}: {e}", path.display()))
}

/// Natural key of a row: the key columns, trimmed and lowercased.
pub(crate) fn row_key(row: &[String], key_idx: &[usize]) -> Vec<String> {
    key_idx
        .iter()
        .map(|i| row.get(*i).map(|v| v.trim().to_lowercase()).unwrap_or_default())
        .collect()
}

/// Header of an existing CSV file, or `None` if the file is absent or empty.
pub(crate) fn read_header(path: &Path) -> Result<Option<Vec<String>>, AppError> {
    if !path.is_file() || std::fs::metadata(path)?.len() == 0 {
        return Ok(None);
    }
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let header = reader.headers().map_err(|e| csv_error(path, e))?;
    Ok(Some(header.iter().map(str::to_string).collect()))
}

/// A CSV file with a fixed header that only ever grows.
///
/// Rows whose natural key is already present (in the file or earlier in the
/// same call) are skipped, so re-exporting a target is a no-op. An existing
/// file whose header differs from the schema is never rewritten.
#[derive(Debug, Clone)]
pub struct AppendOnlyCsv {
    path: PathBuf,
    columns: &'static [&'static str],
    key_columns: &'static [&'static str],
}

impl AppendOnlyCsv {
    pub fn new(
        path: impl Into<PathBuf>,
        columns: &'static [&'static str],
        key_columns: &'static [&'static str],
    ) -> Self {
        Self {
            path: path.into(),
            columns,
            key_columns,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key_indices(&self) -> Vec<usize> {
        self.key_columns
            .iter()
            .filter_map(|k| self.columns.iter().position(|c| c == k))
            .collect()
    }

    fn existing_keys(&self, key_idx: &[usize]) -> Result<HashSet<Vec<String>>, AppError> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| csv_error(&self.path, e))?;
        let mut keys = HashSet::new();
        for record in reader.records() {
            let record = record.map_err(|e| csv_error(&self.path, e))?;
            let row: Vec<String> = record.iter().map(str::to_string).collect();
            keys.insert(row_key(&row, key_idx));
        }
        Ok(keys)
    }

    /// Append the rows not already present.
    ///
    /// Every row must have one value per schema column.
    pub fn append(&self, rows: &[Vec<String>]) -> Result<SaveReport, AppError> {
        let key_idx = self.key_indices();

        let existing = read_header(&self.path)?;
        let mut keys = match &existing {
            Some(header) => {
                if header.iter().map(String::as_str).ne(self.columns.iter().copied()) {
                    return Err(AppError::SchemaMismatch {
                        path: self.path.display().to_string(),
                        reason: format!(
                            "expected {} columns starting with {:?}, found {} starting with {:?}",
                            self.columns.len(),
                            self.columns.first(),
                            header.len(),
                            header.first()
                        ),
                    });
                }
                self.existing_keys(&key_idx)?
            }
            None => HashSet::new(),
        };

        let mut fresh = Vec::new();
        let mut report = SaveReport::default();
        for row in rows {
            if row.len() != self.columns.len() {
                return Err(AppError::SchemaMismatch {
                    path: self.path.display().to_string(),
                    reason: format!(
                        "row has {} values, schema has {} columns",
                        row.len(),
                        self.columns.len()
                    ),
                });
            }
            if keys.insert(row_key(row, &key_idx)) {
                fresh.push(row);
            } else {
                report.rows_skipped += 1;
            }
        }

        if fresh.is_empty() {
            tracing::debug!(
                path = %self.path.display(),
                skipped = report.rows_skipped,
                "Nothing new to append"
            );
            return Ok(report);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);
        if existing.is_none() {
            writer
                .write_record(self.columns)
                .map_err(|e| csv_error(&self.path, e))?;
        }
        for row in &fresh {
            writer
                .write_record(row.iter())
                .map_err(|e| csv_error(&self.path, e))?;
        }
        writer.flush()?;

        report.rows_written = fresh.len();
        tracing::info!(
            path = %self.path.display(),
            written = report.rows_written,
            skipped = report.rows_skipped,
            "CSV rows appended"
        );
        Ok(report)
    }
}
