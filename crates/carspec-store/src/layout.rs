use std::path::{Path, PathBuf};

use carspec_core::error::AppError;
use carspec_core::models::ScrapeTarget;
use carspec_core::util::file_part;

pub const SPECS_CSV: &str = "all_cars.csv";
pub const REVIEWS_CSV: &str = "all_reviews.csv";
pub const REVIEWS_SUFFIX: &str = "_reviews.json";

/// Directory structure of one output root (a worker root or the merged data
/// directory).
///
/// ```text
/// <root>/raw/{make}_{model}_{year}.json
/// <root>/raw/{make}_{model}_reviews.json
/// <root>/raw/debug/{kind}_{timestamp}.html
/// <root>/csv/all_cars.csv
/// <root>/csv/all_reviews.csv
/// <root>/processed/4table/*.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.raw_dir().join("debug")
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.root.join("csv")
    }

    pub fn four_table_dir(&self) -> PathBuf {
        self.root.join("processed").join("4table")
    }

    pub fn specs_csv(&self) -> PathBuf {
        self.csv_dir().join(SPECS_CSV)
    }

    pub fn reviews_csv(&self) -> PathBuf {
        self.csv_dir().join(REVIEWS_CSV)
    }

    pub fn raw_file(&self, target: &ScrapeTarget) -> PathBuf {
        self.raw_dir().join(format!(
            "{}_{}_{}.json",
            file_part(&target.make),
            file_part(&target.model),
            target.year
        ))
    }

    pub fn reviews_file(&self, make: &str, model: &str) -> PathBuf {
        self.raw_dir()
            .join(format!("{}_{}{REVIEWS_SUFFIX}", file_part(make), file_part(model)))
    }

    /// Create every directory of the layout.
    pub fn ensure(&self) -> Result<(), AppError> {
        for dir in [
            self.raw_dir(),
            self.debug_dir(),
            self.csv_dir(),
            self.four_table_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
