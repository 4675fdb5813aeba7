use carspec_core::error::AppError;
use carspec_core::models::ScrapeTarget;
use carspec_core::reviews::{ConsumerReview, ReviewData};
use carspec_core::traits::ResultSink;
use carspec_store::FileStore;
use carspec_store::columns::{REVIEW_COLUMNS, SPEC_COLUMNS};

use crate::integration::common::{column, dataset_for, read_csv, read_json, sedan_scrape};

#[tokio::test]
async fn save_scrape_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let scrape = sedan_scrape("Toyota", "Camry", 2020);

    let report = store.save_scrape(&scrape, &dataset_for(&scrape)).await.unwrap();
    assert_eq!(report.rows_written, 2);
    assert_eq!(report.rows_skipped, 0);

    let raw = read_json(&dir.path().join("raw/Toyota_Camry_2020.json"));
    assert_eq!(raw["bodytypes"][0]["trim_names"][1], "XSE Sedan");

    let four_table = std::fs::read_dir(dir.path().join("processed/4table"))
        .unwrap()
        .count();
    assert_eq!(four_table, 6);

    let (header, rows) = read_csv(&dir.path().join("csv/all_cars.csv"));
    assert_eq!(header.len(), SPEC_COLUMNS.len());
    assert_eq!(rows.len(), 2);
    assert_eq!(column(&header, &rows[0], "trim"), "LE Sedan");
    assert_eq!(column(&header, &rows[0], "price"), "24425");
    assert_eq!(column(&header, &rows[1], "hp"), "301");
    assert_eq!(column(&header, &rows[0], "mpg_hwy"), "39");
    assert_eq!(column(&header, &rows[1], "mpg_hwy"), "");
    assert_eq!(column(&header, &rows[0], "0 - 60"), "7.5 sec");
    assert_eq!(column(&header, &rows[1], "Drivetrain"), "FWD");
}

#[tokio::test]
async fn re_export_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let scrape = sedan_scrape("Toyota", "Camry", 2020);
    let dataset = dataset_for(&scrape);

    store.save_scrape(&scrape, &dataset).await.unwrap();
    let before = std::fs::read_to_string(dir.path().join("csv/all_cars.csv")).unwrap();

    let report = store.save_scrape(&scrape, &dataset).await.unwrap();
    assert_eq!(report.rows_written, 0);
    assert_eq!(report.rows_skipped, 2);
    let after = std::fs::read_to_string(dir.path().join("csv/all_cars.csv")).unwrap();
    assert_eq!(before, after);

    let other = sedan_scrape("Toyota", "Camry", 2021);
    let report = store.save_scrape(&other, &dataset_for(&other)).await.unwrap();
    assert_eq!(report.rows_written, 2);
    let (_, rows) = read_csv(&dir.path().join("csv/all_cars.csv"));
    assert_eq!(rows.len(), 4);
}

#[tokio::test]
async fn foreign_header_is_never_appended_to() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let csv_path = dir.path().join("csv/all_cars.csv");
    std::fs::write(&csv_path, "make,model,year,trim\nKia,Rio,2020,LX\n").unwrap();

    let scrape = sedan_scrape("Toyota", "Camry", 2020);
    let err = store
        .save_scrape(&scrape, &dataset_for(&scrape))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SchemaMismatch { .. }));
    assert_eq!(
        std::fs::read_to_string(&csv_path).unwrap(),
        "make,model,year,trim\nKia,Rio,2020,LX\n"
    );
}

#[tokio::test]
async fn reviews_upsert_json_and_dedupe_csv() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let target = ScrapeTarget::new("Honda", "Accord", 2019);

    let mut data = ReviewData::new(&target);
    data.consumer_review = Some(ConsumerReview {
        overall_rating: Some(4.6),
        review_count: Some(88),
        ..ConsumerReview::default()
    });
    store.save_reviews(&target, &data).await.unwrap();
    store.save_reviews(&target, &data).await.unwrap();

    let (header, rows) = read_csv(&dir.path().join("csv/all_reviews.csv"));
    assert_eq!(header.len(), REVIEW_COLUMNS.len());
    assert_eq!(rows.len(), 1);
    assert_eq!(column(&header, &rows[0], "consumer_review_count"), "88");

    let doc = read_json(&dir.path().join("raw/Honda_Accord_reviews.json"));
    assert_eq!(doc["years"]["2019"]["consumer_review"]["overall_rating"], 4.6);
}

#[tokio::test]
async fn debug_html_lands_under_raw_debug() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    let path = store
        .save_debug_html("blocked", "<html>captcha</html>")
        .await
        .unwrap()
        .unwrap();
    assert!(path.starts_with(dir.path().join("raw/debug")));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "<html>captcha</html>");
}
