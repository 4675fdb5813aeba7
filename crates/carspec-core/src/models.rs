use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use md5::Md5;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Placeholder written into a spec row when a trim has no value for it.
pub const MISSING_VALUE: &str = "N/A";

/// One (make, model, year) to scrape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScrapeTarget {
    pub make: String,
    pub model: String,
    /// Accepts either `2020` or `"2020"` in batch files.
    #[serde(deserialize_with = "deserialize_year")]
    pub year: u16,
}

impl ScrapeTarget {
    pub fn new(make: impl Into<String>, model: impl Into<String>, year: u16) -> Self {
        Self {
            make: make.into(),
            model: model.into(),
            year,
        }
    }
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.year, self.make, self.model)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YearRepr {
    Number(u16),
    Text(String),
}

fn deserialize_year<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match YearRepr::deserialize(deserializer)? {
        YearRepr::Number(n) => Ok(n),
        YearRepr::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid year '{s}'"))),
    }
}

/// Outcome of navigating to a target's specs page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    /// The trim comparison table is (or may be) present.
    Specs,
    /// The site redirected to a general model page.
    Overview,
    NotFound,
    Blocked,
}

impl PageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageState::Specs => "specs",
            PageState::Overview => "overview",
            PageState::NotFound => "not_found",
            PageState::Blocked => "blocked",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical body-style taxonomy used for grouping tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyCategory {
    Sedan,
    Suv,
    Wagon,
    Coupe,
    Convertible,
    Hatchback,
    Truck,
    Van,
    Hybrid,
    Electric,
    Performance,
    Default,
}

impl BodyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyCategory::Sedan => "sedan",
            BodyCategory::Suv => "suv",
            BodyCategory::Wagon => "wagon",
            BodyCategory::Coupe => "coupe",
            BodyCategory::Convertible => "convertible",
            BodyCategory::Hatchback => "hatchback",
            BodyCategory::Truck => "truck",
            BodyCategory::Van => "van",
            BodyCategory::Hybrid => "hybrid",
            BodyCategory::Electric => "electric",
            BodyCategory::Performance => "performance",
            BodyCategory::Default => "default",
        }
    }
}

impl fmt::Display for BodyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A selectable body-type section on the specs page.
///
/// `name` is the cleaned display name records are filed under; the category
/// is detected from the label as the page showed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyTypeTab {
    pub name: String,
    pub raw_label: String,
    pub canonical_category: BodyCategory,
}

/// One label with exactly one value per trim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSpecRow {
    pub label: String,
    pub values: Vec<String>,
}

impl RawSpecRow {
    /// Builds a row whose value count equals `trim_count`, padding with
    /// [`MISSING_VALUE`] or truncating.
    pub fn new(label: impl Into<String>, mut values: Vec<String>, trim_count: usize) -> Self {
        values.resize(trim_count, MISSING_VALUE.to_string());
        Self {
            label: label.into(),
            values,
        }
    }

    /// The value for trim `idx`, or `None` when it is empty or the placeholder.
    pub fn value(&self, idx: usize) -> Option<&str> {
        self.values
            .get(idx)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != MISSING_VALUE)
    }
}

/// Raw rows scraped for one body-type tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimRecord {
    pub bodytype: String,
    pub trims: Vec<String>,
    pub rows: Vec<RawSpecRow>,
}

impl TrimRecord {
    /// Builds a record, conforming every row to the trim count.
    pub fn new(bodytype: impl Into<String>, trims: Vec<String>, rows: Vec<RawSpecRow>) -> Self {
        let n = trims.len();
        let rows = rows
            .into_iter()
            .map(|r| RawSpecRow::new(r.label, r.values, n))
            .collect();
        Self {
            bodytype: bodytype.into(),
            trims,
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trims.is_empty() && self.rows.is_empty()
    }
}

/// Everything scraped for one target, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScrape {
    pub target: ScrapeTarget,
    pub page_state: PageState,
    pub scraped_at: DateTime<Utc>,
    pub tabs: Vec<BodyTypeTab>,
    /// Tab labels grouped by canonical category, near-duplicates removed.
    pub tab_groups: BTreeMap<BodyCategory, Vec<String>>,
    pub records: Vec<TrimRecord>,
}

/// Row counts from one spec export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub rows_written: usize,
    pub rows_skipped: usize,
}

/// What a merge pass produced in the destination root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub csv_files: usize,
    pub csv_rows: usize,
    pub review_documents: usize,
    pub copied_files: usize,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic id for a natural key.
///
/// MD5 of the lowercased `brand|model|year|trim|bodytype` string, first eight
/// bytes read big-endian, masked to a non-negative 63-bit integer.
pub fn vehicle_id(brand: &str, model: &str, year: u16, trim: &str, bodytype: &str) -> i64 {
    let key = format!("{brand}|{model}|{year}|{trim}|{bodytype}").to_lowercase();
    let digest = Md5::digest(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) & 0x7FFF_FFFF_FFFF_FFFF) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_vehicle_id_deterministic_and_case_insensitive() {
        let a = vehicle_id("Toyota", "Camry", 2020, "LE", "Sedan");
        let b = vehicle_id("toyota", "CAMRY", 2020, "le", "sedan");
        assert_eq!(a, b);
        assert!(a >= 0);
        assert_eq!(a, vehicle_id("Toyota", "Camry", 2020, "LE", "Sedan"));
    }

    #[test]
    fn test_vehicle_id_changes_with_each_field() {
        let base = vehicle_id("Toyota", "Camry", 2020, "LE", "Sedan");
        let variants = [
            vehicle_id("Honda", "Camry", 2020, "LE", "Sedan"),
            vehicle_id("Toyota", "Corolla", 2020, "LE", "Sedan"),
            vehicle_id("Toyota", "Camry", 2021, "LE", "Sedan"),
            vehicle_id("Toyota", "Camry", 2020, "SE", "Sedan"),
            vehicle_id("Toyota", "Camry", 2020, "LE", "Coupe"),
        ];
        for v in variants {
            assert_ne!(base, v);
        }
    }

    #[test]
    fn test_raw_spec_row_pads_and_truncates() {
        let short = RawSpecRow::new("Horsepower", vec!["203".into()], 3);
        assert_eq!(short.values, vec!["203", MISSING_VALUE, MISSING_VALUE]);

        let long = RawSpecRow::new(
            "Horsepower",
            vec!["1".into(), "2".into(), "3".into(), "4".into()],
            2,
        );
        assert_eq!(long.values.len(), 2);
        assert_eq!(long.value(1), Some("2"));
        assert_eq!(short.value(1), None);
    }

    #[test]
    fn test_trim_record_conforms_rows() {
        let rec = TrimRecord::new(
            "Sedan",
            vec!["LE".into(), "SE".into()],
            vec![RawSpecRow {
                label: "Engine".into(),
                values: vec!["2.5L".into()],
            }],
        );
        assert_eq!(rec.rows[0].values.len(), 2);
    }

    #[test]
    fn test_target_year_from_string_or_number() {
        let a: ScrapeTarget =
            serde_json::from_str(r#"{"make":"Toyota","model":"Camry","year":"2020"}"#).unwrap();
        let b: ScrapeTarget =
            serde_json::from_str(r#"{"make":"Toyota","model":"Camry","year":2020}"#).unwrap();
        assert_eq!(a, b);
        assert!(
            serde_json::from_str::<ScrapeTarget>(r#"{"make":"x","model":"y","year":"soon"}"#)
                .is_err()
        );
    }
}
