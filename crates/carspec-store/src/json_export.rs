use std::path::{Path, PathBuf};

use carspec_core::dataset::{Dataset, TABLE_NAMES};
use carspec_core::error::AppError;
use carspec_core::models::ScrapeTarget;
use carspec_core::util::{file_part, file_timestamp};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::review_export::write_json;

pub const SCHEMA_VERSION: &str = "4table_v1";
const SOURCE: &str = "carspec";

/// Writes the normalized tables of one target as self-describing JSON.
///
/// File names carry the export timestamp, so repeated exports never collide
/// and merging can copy them verbatim.
#[derive(Debug, Clone)]
pub struct FourTableExporter {
    dir: PathBuf,
}

impl FourTableExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, prefix: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{prefix}_{suffix}.json"))
    }

    /// Export at the current time. Returns the written paths.
    pub fn export(
        &self,
        target: &ScrapeTarget,
        dataset: &Dataset,
    ) -> Result<Vec<PathBuf>, AppError> {
        self.export_at(target, dataset, Utc::now())
    }

    pub fn export_at(
        &self,
        target: &ScrapeTarget,
        dataset: &Dataset,
        at: DateTime<Utc>,
    ) -> Result<Vec<PathBuf>, AppError> {
        std::fs::create_dir_all(&self.dir)?;
        let prefix = format!(
            "{}_{}_{}_{}",
            file_timestamp(at),
            file_part(&target.make),
            file_part(&target.model),
            target.year
        );

        let tables = dataset.tables()?;
        let mut written = Vec::with_capacity(TABLE_NAMES.len() + 2);
        for name in TABLE_NAMES {
            if let Some(doc) = tables.get(name) {
                let path = self.path(&prefix, name);
                write_json(&path, doc)?;
                written.push(path);
            }
        }

        let combined = self.path(&prefix, "combined_4table");
        write_json(&combined, &Value::Object(tables))?;
        written.push(combined);

        let metadata = self.path(&prefix, "metadata");
        write_json(&metadata, &metadata_document(target, dataset, at))?;
        written.push(metadata);

        tracing::info!(
            make = %target.make,
            model = %target.model,
            year = target.year,
            vehicles = dataset.len(),
            dir = %self.dir.display(),
            "Four-table JSON exported"
        );
        Ok(written)
    }
}

fn metadata_document(target: &ScrapeTarget, dataset: &Dataset, at: DateTime<Utc>) -> Value {
    json!({
        "export_info": {
            "timestamp": at.to_rfc3339(),
            "schema_version": SCHEMA_VERSION,
            "source": SOURCE,
        },
        "vehicle_info": {
            "make": target.make,
            "model": target.model,
            "year": target.year,
        },
        "record_counts": dataset.record_counts(),
        "tables": TABLE_NAMES,
    })
}

pub fn is_json_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|e| e == "json")
}
