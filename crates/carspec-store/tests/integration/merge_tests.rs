use std::path::{Path, PathBuf};

use carspec_core::models::ScrapeTarget;
use carspec_core::reviews::{ExpertReview, ReviewData};
use carspec_core::traits::{OutputMerger, ResultSink};
use carspec_store::{FileMerger, FileStore};

use crate::integration::common::{column, dataset_for, read_csv, read_json, sedan_scrape};

async fn populate(root: &Path, make: &str, model: &str, year: u16) {
    let store = FileStore::open(root).unwrap();
    let scrape = sedan_scrape(make, model, year);
    store.save_scrape(&scrape, &dataset_for(&scrape)).await.unwrap();

    let target = ScrapeTarget::new(make, model, year);
    let mut reviews = ReviewData::new(&target);
    reviews.expert_review = Some(ExpertReview {
        expert_rating: Some(4.0),
        ..ExpertReview::default()
    });
    store.save_reviews(&target, &reviews).await.unwrap();
    store.save_debug_html("failed", "<html></html>").await.unwrap();
}

fn worker_roots(base: &Path, n: usize) -> Vec<PathBuf> {
    (0..n).map(|i| base.join(format!("workers/worker_{i}"))).collect()
}

#[tokio::test]
async fn merge_combines_workers_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let roots = worker_roots(dir.path(), 2);
    populate(&roots[0], "Toyota", "Camry", 2019).await;
    populate(&roots[1], "Toyota", "Camry", 2020).await;

    let merger = FileMerger::new();
    let report = merger.merge(&roots, dir.path()).unwrap();
    assert_eq!(report.csv_files, 2);
    assert_eq!(report.csv_rows, 4 + 2);
    assert_eq!(report.review_documents, 1);

    let (header, rows) = read_csv(&dir.path().join("csv/all_cars.csv"));
    assert_eq!(rows.len(), 4);
    assert_eq!(column(&header, &rows[0], "year"), "2019");
    assert_eq!(column(&header, &rows[3], "year"), "2020");

    let doc = read_json(&dir.path().join("raw/Toyota_Camry_reviews.json"));
    let years = doc["years"].as_object().unwrap();
    assert!(years.contains_key("2019"));
    assert!(years.contains_key("2020"));

    assert!(dir.path().join("raw/Toyota_Camry_2019.json").is_file());
    assert!(dir.path().join("raw/Toyota_Camry_2020.json").is_file());
    assert_eq!(std::fs::read_dir(dir.path().join("processed/4table")).unwrap().count(), 12);
    // Same-second captures from two workers share a name; the first one wins.
    assert!(std::fs::read_dir(dir.path().join("raw/debug")).unwrap().count() >= 1);

    let first = std::fs::read_to_string(dir.path().join("csv/all_cars.csv")).unwrap();
    let again = merger.merge(&roots, dir.path()).unwrap();
    assert_eq!(again.csv_rows, report.csv_rows);
    let second = std::fs::read_to_string(dir.path().join("csv/all_cars.csv")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn merge_unions_disjoint_headers() {
    let dir = tempfile::tempdir().unwrap();
    let roots = worker_roots(dir.path(), 2);
    for (root, body) in roots.iter().zip([
        "make,model,year,bodytype,trim,hp\nKia,Rio,2020,Sedan,LX,120\n",
        "make,model,year,bodytype,trim,torque_lbft\nKia,Soul,2020,Wagon,GT,195\n",
    ]) {
        std::fs::create_dir_all(root.join("csv")).unwrap();
        std::fs::write(root.join("csv/all_cars.csv"), body).unwrap();
    }

    FileMerger::new().merge(&roots, &dir.path().join("merged")).unwrap();

    let (header, rows) = read_csv(&dir.path().join("merged/csv/all_cars.csv"));
    assert_eq!(
        header,
        vec!["make", "model", "year", "bodytype", "trim", "hp", "torque_lbft"]
    );
    assert_eq!(column(&header, &rows[0], "torque_lbft"), "");
    assert_eq!(column(&header, &rows[1], "hp"), "");
    assert_eq!(column(&header, &rows[1], "torque_lbft"), "195");
}

#[tokio::test]
async fn merge_keeps_years_already_in_destination() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path(), "Honda", "Civic", 2018).await;

    let roots = worker_roots(dir.path(), 1);
    populate(&roots[0], "Honda", "Civic", 2021).await;
    FileMerger::new().merge(&roots, dir.path()).unwrap();

    let doc = read_json(&dir.path().join("raw/Honda_Civic_reviews.json"));
    assert_eq!(doc["years"].as_object().unwrap().len(), 2);
    let (_, rows) = read_csv(&dir.path().join("csv/all_cars.csv"));
    assert_eq!(rows.len(), 4);
}

#[test]
fn missing_worker_roots_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let report = FileMerger::new()
        .merge(&worker_roots(dir.path(), 3), dir.path())
        .unwrap();
    assert_eq!(report.csv_files, 0);
    assert_eq!(report.copied_files, 0);
    assert!(dir.path().join("csv").is_dir());
}
