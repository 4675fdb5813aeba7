use std::path::Path;

use carspec_core::error::AppError;
use carspec_core::reviews::ReviewData;
use chrono::Utc;
use serde_json::{Map, Value, json};

/// Read a per-model review document, or start a fresh one.
pub(crate) fn load_review_document(
    path: &Path,
    make: &str,
    model: &str,
) -> Result<Value, AppError> {
    if path.is_file() {
        let text = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Value>(&text) {
            Ok(doc) if doc.is_object() => return Ok(doc),
            _ => {
                tracing::warn!(path = %path.display(), "Unreadable review document, starting over");
            }
        }
    }
    Ok(json!({
        "make": make,
        "model": model,
        "years": {},
    }))
}

/// Insert or replace `year` entries under the document's `years` map.
pub(crate) fn merge_years(doc: &mut Value, years: Map<String, Value>) {
    let Some(object) = doc.as_object_mut() else {
        return;
    };
    let entry = object
        .entry("years")
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Some(existing) = entry.as_object_mut() {
        existing.extend(years);
    }
    object.insert("last_updated".to_string(), json!(Utc::now().to_rfc3339()));
}

pub(crate) fn write_json(path: &Path, value: &Value) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Upsert one model year into `{make}_{model}_reviews.json`.
///
/// Other years already in the document are kept.
pub fn upsert_review(path: &Path, data: &ReviewData) -> Result<(), AppError> {
    let mut doc = load_review_document(path, &data.make, &data.model)?;
    let mut years = Map::new();
    years.insert(data.year.to_string(), serde_json::to_value(data)?);
    merge_years(&mut doc, years);
    write_json(path, &doc)?;
    tracing::debug!(path = %path.display(), year = data.year, "Review document updated");
    Ok(())
}
