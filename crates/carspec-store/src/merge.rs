//! Reconcile isolated worker output roots into one destination root.
//!
//! Merging is order-independent with respect to worker completion and
//! idempotent: running it twice over the same roots yields the same files.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use carspec_core::error::AppError;
use carspec_core::models::MergeReport;
use carspec_core::traits::OutputMerger;
use serde_json::{Map, Value};

use crate::columns::{REVIEW_KEY_COLUMNS, SPEC_KEY_COLUMNS};
use crate::csv_export::{csv_error, row_key};
use crate::json_export::is_json_file;
use crate::layout::{OutputLayout, REVIEWS_CSV, REVIEWS_SUFFIX, SPECS_CSV};
use crate::review_export::{load_review_document, merge_years, write_json};

/// A CSV file read in full.
struct CsvTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn read_table(path: &Path) -> Result<CsvTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    let header = reader
        .headers()
        .map_err(|e| csv_error(path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(CsvTable { header, rows })
}

fn key_columns(file_name: &str) -> &'static [&'static str] {
    match file_name {
        SPECS_CSV => SPEC_KEY_COLUMNS,
        REVIEWS_CSV => REVIEW_KEY_COLUMNS,
        _ => &[],
    }
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut entries = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Union the headers of `sources` in first-seen order and concatenate their
/// rows, dropping rows whose natural key (or whole content, for files without
/// one) was already seen.
fn union_tables(sources: &[CsvTable], keys: &[&str]) -> CsvTable {
    let mut header: Vec<String> = Vec::new();
    for table in sources {
        for column in &table.header {
            if !header.contains(column) {
                header.push(column.clone());
            }
        }
    }

    let key_idx: Vec<usize> = keys
        .iter()
        .filter_map(|k| header.iter().position(|c| c == k))
        .collect();
    let dedupe_on_key = !keys.is_empty() && key_idx.len() == keys.len();
    let all_idx: Vec<usize> = (0..header.len()).collect();

    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for table in sources {
        let positions: Vec<Option<usize>> = header
            .iter()
            .map(|c| table.header.iter().position(|h| h == c))
            .collect();
        for row in &table.rows {
            let aligned: Vec<String> = positions
                .iter()
                .map(|p| p.and_then(|i| row.get(i)).cloned().unwrap_or_default())
                .collect();
            let key = row_key(&aligned, if dedupe_on_key { &key_idx } else { &all_idx });
            if seen.insert(key) {
                rows.push(aligned);
            }
        }
    }
    CsvTable { header, rows }
}

fn write_table(path: &Path, table: &CsvTable) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    writer
        .write_record(&table.header)
        .map_err(|e| csv_error(path, e))?;
    for row in &table.rows {
        writer.write_record(row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

/// Copy every file under `src` into `dst`, keeping files already in `dst`.
fn copy_tree_no_clobber(src: &Path, dst: &Path) -> Result<usize, AppError> {
    std::fs::create_dir_all(dst)?;
    let mut copied = 0;
    for path in list_dir(src)? {
        let Some(name) = path.file_name() else {
            continue;
        };
        let target = dst.join(name);
        if path.is_dir() {
            copied += copy_tree_no_clobber(&path, &target)?;
        } else if !target.exists() {
            std::fs::copy(&path, &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// The default [`OutputMerger`]: header-union CSV merge, year-level review
/// document merge, verbatim copy of everything else.
#[derive(Debug, Clone, Default)]
pub struct FileMerger;

impl FileMerger {
    pub fn new() -> Self {
        Self
    }

    fn merge_csvs(
        &self,
        roots: &[OutputLayout],
        dest: &OutputLayout,
        report: &mut MergeReport,
    ) -> Result<(), AppError> {
        let mut names = BTreeSet::new();
        for root in roots {
            for path in list_dir(&root.csv_dir())? {
                if path.is_file() && path.extension().is_some_and(|e| e == "csv") {
                    if let Some(name) = file_name(&path) {
                        names.insert(name.to_string());
                    }
                }
            }
        }

        for name in names {
            let dest_path = dest.csv_dir().join(&name);
            let mut sources = Vec::new();
            if dest_path.is_file() {
                sources.push(read_table(&dest_path)?);
            }
            for root in roots {
                let path = root.csv_dir().join(&name);
                if !path.is_file() {
                    continue;
                }
                match read_table(&path) {
                    Ok(table) => sources.push(table),
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable CSV"
                    ),
                }
            }

            let merged = union_tables(&sources, key_columns(&name));
            write_table(&dest_path, &merged)?;
            tracing::info!(
                file = %name,
                sources = sources.len(),
                columns = merged.header.len(),
                rows = merged.rows.len(),
                "CSV merged"
            );
            report.csv_files += 1;
            report.csv_rows += merged.rows.len();
        }
        Ok(())
    }

    fn merge_review_document(&self, src: &Path, dest: &Path) -> Result<bool, AppError> {
        let doc: Value = match std::fs::read_to_string(src)
            .map_err(AppError::from)
            .and_then(|t| serde_json::from_str(&t).map_err(AppError::from))
        {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    path = %src.display(),
                    error = %e,
                    "Skipping unreadable review document"
                );
                return Ok(false);
            }
        };

        let make = doc.get("make").and_then(Value::as_str).unwrap_or_default();
        let model = doc.get("model").and_then(Value::as_str).unwrap_or_default();
        let years = doc
            .get("years")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new);

        let mut merged = load_review_document(dest, make, model)?;
        merge_years(&mut merged, years);
        write_json(dest, &merged)?;
        Ok(true)
    }

    fn merge_raw(
        &self,
        roots: &[OutputLayout],
        dest: &OutputLayout,
        report: &mut MergeReport,
    ) -> Result<(), AppError> {
        let mut review_docs = HashSet::new();
        for root in roots {
            for path in list_dir(&root.raw_dir())? {
                let Some(name) = file_name(&path).map(str::to_string) else {
                    continue;
                };
                let target = dest.raw_dir().join(&name);
                if path.is_dir() {
                    report.copied_files += copy_tree_no_clobber(&path, &target)?;
                } else if name.ends_with(REVIEWS_SUFFIX) {
                    if self.merge_review_document(&path, &target)? {
                        review_docs.insert(target);
                    }
                } else if is_json_file(&path) {
                    std::fs::copy(&path, &target)?;
                    report.copied_files += 1;
                }
            }
        }
        report.review_documents = review_docs.len();
        Ok(())
    }

    fn copy_four_table(
        &self,
        roots: &[OutputLayout],
        dest: &OutputLayout,
        report: &mut MergeReport,
    ) -> Result<(), AppError> {
        for root in roots {
            for path in list_dir(&root.four_table_dir())? {
                if !is_json_file(&path) {
                    continue;
                }
                if let Some(name) = path.file_name() {
                    std::fs::copy(&path, dest.four_table_dir().join(name))?;
                    report.copied_files += 1;
                }
            }
        }
        Ok(())
    }
}

impl OutputMerger for FileMerger {
    fn merge(&self, worker_roots: &[PathBuf], dest: &Path) -> Result<MergeReport, AppError> {
        let dest = OutputLayout::new(dest);
        dest.ensure()?;
        let roots: Vec<OutputLayout> = worker_roots
            .iter()
            .filter(|r| r.is_dir())
            .map(|r| OutputLayout::new(r.as_path()))
            .collect();

        let mut report = MergeReport::default();
        self.merge_csvs(&roots, &dest, &mut report)?;
        self.merge_raw(&roots, &dest, &mut report)?;
        self.copy_four_table(&roots, &dest, &mut report)?;

        tracing::info!(
            workers = roots.len(),
            dest = %dest.root().display(),
            csv_files = report.csv_files,
            csv_rows = report.csv_rows,
            review_documents = report.review_documents,
            copied_files = report.copied_files,
            "Merge complete"
        );
        Ok(report)
    }
}
