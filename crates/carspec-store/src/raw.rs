use std::path::{Path, PathBuf};

use carspec_core::error::AppError;
use carspec_core::models::{BodyCategory, RawScrape, RawSpecRow, compute_hash};
use carspec_core::util::{file_part, file_timestamp};
use chrono::Utc;
use serde::Serialize;

use crate::review_export::write_json;

#[derive(Debug, Serialize)]
struct RawBodyType<'a> {
    tab_name: &'a str,
    category: BodyCategory,
    trim_names: &'a [String],
    specifications: &'a [RawSpecRow],
    content_hash: String,
}

#[derive(Debug, Serialize)]
struct RawDocument<'a> {
    make: &'a str,
    model: &'a str,
    year: u16,
    page_state: &'a str,
    scraped_at: String,
    tab_groups: &'a std::collections::BTreeMap<BodyCategory, Vec<String>>,
    bodytypes: Vec<RawBodyType<'a>>,
}

fn document(scrape: &RawScrape) -> Result<RawDocument<'_>, AppError> {
    let mut bodytypes = Vec::with_capacity(scrape.records.len());
    for record in &scrape.records {
        let category = scrape
            .tabs
            .iter()
            .find(|t| t.name == record.bodytype)
            .map(|t| t.canonical_category)
            .unwrap_or(BodyCategory::Default);
        bodytypes.push(RawBodyType {
            tab_name: &record.bodytype,
            category,
            trim_names: &record.trims,
            specifications: &record.rows,
            content_hash: compute_hash(&serde_json::to_string(record)?),
        });
    }

    Ok(RawDocument {
        make: &scrape.target.make,
        model: &scrape.target.model,
        year: scrape.target.year,
        page_state: scrape.page_state.as_str(),
        scraped_at: scrape.scraped_at.to_rfc3339(),
        tab_groups: &scrape.tab_groups,
        bodytypes,
    })
}

/// Write the raw document for one target, replacing any earlier scrape of
/// the same (make, model, year).
pub fn write_raw(path: &Path, scrape: &RawScrape) -> Result<(), AppError> {
    let value = serde_json::to_value(document(scrape)?)?;
    write_json(path, &value)?;
    tracing::debug!(path = %path.display(), "Raw document written");
    Ok(())
}

/// Save a page source as `{kind}_{timestamp}.html` under `debug_dir`.
///
/// Two captures of the same kind in one second get a numeric suffix.
pub fn write_debug_html(debug_dir: &Path, kind: &str, html: &str) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(debug_dir)?;
    let stem = format!("{}_{}", file_part(kind), file_timestamp(Utc::now()));
    let mut path = debug_dir.join(format!("{stem}.html"));
    let mut n = 1;
    while path.exists() {
        path = debug_dir.join(format!("{stem}_{n}.html"));
        n += 1;
    }
    std::fs::write(&path, html)?;
    tracing::info!(path = %path.display(), kind, "Saved debug page source");
    Ok(path)
}
