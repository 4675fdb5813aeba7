use std::collections::BTreeMap;
use std::path::Path;

use carspec_core::dataset::Dataset;
use carspec_core::models::{
    BodyCategory, BodyTypeTab, PageState, RawScrape, RawSpecRow, ScrapeTarget, TrimRecord,
};
use carspec_core::transform::SchemaTransformer;
use chrono::Utc;

/// A two-trim sedan scrape with a mix of parsed, raw and unknown labels.
pub fn sedan_scrape(make: &str, model: &str, year: u16) -> RawScrape {
    let trims = vec!["LE Sedan".to_string(), "XSE Sedan".to_string()];
    let rows = vec![
        RawSpecRow::new("Fair Market Price", vec!["$24,425".into(), "$29,575".into()], 2),
        RawSpecRow::new("Horsepower", vec!["203 @ 6600 rpm".into(), "301 @ 6600 rpm".into()], 2),
        RawSpecRow::new("Fuel Economy", vec!["City 28/Hwy 39/Comb 32 MPG".into()], 2),
        RawSpecRow::new("Drivetrain", vec!["FWD".into(), "FWD".into()], 2),
        RawSpecRow::new("0 to 60", vec!["7.5 sec".into(), "5.8 sec".into()], 2),
        RawSpecRow::new("Seat Trim", vec!["Cloth".into(), "Leather".into()], 2),
    ];
    RawScrape {
        target: ScrapeTarget::new(make, model, year),
        page_state: PageState::Specs,
        scraped_at: Utc::now(),
        tabs: vec![BodyTypeTab {
            name: "Sedan".into(),
            raw_label: "Sedan".into(),
            canonical_category: BodyCategory::Sedan,
        }],
        tab_groups: BTreeMap::from([(BodyCategory::Sedan, vec!["Sedan".to_string()])]),
        records: vec![TrimRecord::new("Sedan", trims, rows)],
    }
}

pub fn dataset_for(scrape: &RawScrape) -> Dataset {
    SchemaTransformer::new().transform(&scrape.target, &scrape.records)
}

pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

pub fn column<'a>(header: &[String], row: &'a [String], name: &str) -> &'a str {
    let idx = header.iter().position(|c| c == name).unwrap();
    &row[idx]
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
