//! Fixed CSV schemas and the flattening of raw scrapes into rows.
//!
//! Columns are never added dynamically: a label either maps onto a schema
//! column or is dropped (reported once through [`LabelWarnings`]).

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use carspec_core::labels::canonical_label;
use carspec_core::models::RawScrape;
use carspec_core::reviews::{REVIEW_CATEGORIES, ReviewData};
use carspec_core::value_parser::{
    parse_fuel_economy, parse_power, parse_price, parse_torque, parse_volume, parse_weight,
};
use regex::Regex;

use crate::warnings::LabelWarnings;

/// Natural key of the specs table.
pub const SPEC_KEY_COLUMNS: &[&str] = &["make", "model", "year", "bodytype", "trim"];

pub const SPEC_COLUMNS: &[&str] = &[
    // identity
    "make",
    "model",
    "year",
    "bodytype",
    "trim",
    // specifications
    "price",
    "mpg_city",
    "mpg_hwy",
    "mpg_comb",
    "Fuel Type",
    "hp",
    "Engine",
    "torque_lbft",
    "cargo_cuft",
    "0 - 60",
    "curb_weight_lbs",
    "Drivetrain",
    "Transmission Type",
    "Recommended Fuel",
    "Fuel Capacity",
    "Wheel Base",
    "Overall Length",
    "Front Head Room",
    "Front Leg Room",
    "Front Shoulder Room",
    "Width with mirrors",
    "Turning Diameter",
    // features
    "Blind-Spot Alert",
    "Collision Warning System",
    "Child Seat Anchors",
    "Child Door Locks",
    "Traction Control",
    "Bluetooth Wireless Technology",
    "Cruise Control",
    "Remote Keyless Entry",
    "Remote Engine Start",
    "Smartphone Interface",
    "Internet Access",
    "Navigation System",
    "Voice Recognition System",
    "Real-Time Traffic Information",
    "Hands Free Phone",
    "Premium Radio",
    "Bluetooth Streaming Audio",
    "Satellite Radio",
    "Remote Control Liftgate/Trunk Release",
    "Heated Mirrors",
    "Leather Seats",
    "Folding Rear Seat",
    "Dual Power Front Seats",
    "Power Driver's Seat",
    "Leather-Wrapped Steering Wheel",
    "Power Outlet",
    "Power Windows",
    "Rear Window Defroster",
    "Steering Wheel Controls",
    "Tilt Steering Wheel",
    "Tilt/Telescoping Steering Wheel",
    "Cup Holder Count",
    "Alloy Wheels",
    "Fog Lights",
    "Power Folding Exterior Mirrors",
    "Rear Spoiler",
    "Rain Sensing Windshield Wipers",
    "Alarm System",
    "Dual-Clutch Automatic Transmission",
    "Hill Start Assist",
    "Stability Control",
];

/// Natural key of the reviews table.
pub const REVIEW_KEY_COLUMNS: &[&str] = &["make", "model", "year"];

pub const REVIEW_COLUMNS: &[&str] = &[
    "make",
    "model",
    "year",
    "consumer_overall_rating",
    "consumer_review_count",
    "consumer_recommend_pct",
    "star_5_pct",
    "star_4_pct",
    "star_3_pct",
    "star_2_pct",
    "star_1_pct",
    "rating_value",
    "rating_performance",
    "rating_quality",
    "rating_comfort",
    "rating_reliability",
    "rating_styling",
    "expert_rating",
    "expert_ranking",
    "pros",
    "cons",
];

/// Labels that look like trim names ("Sedan 4D") mean the table was read
/// transposed.
static TRIM_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Sedan|Coupe|Convertible|Hatchback|Wagon|SUV|Cab|Van|Truck)\s+\d+D\b").unwrap()
});

/// Lowercased column name → index, for raw labels written verbatim.
static SPEC_INDEX: LazyLock<HashMap<String, usize>> = LazyLock::new(|| {
    SPEC_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, c)| (c.to_lowercase(), i))
        .collect()
});

type Parser = fn(&str) -> Option<String>;

fn price(v: &str) -> Option<String> {
    parse_price(v).map(|n| n.to_string())
}

fn horsepower(v: &str) -> Option<String> {
    parse_power(v).map(|n| n.to_string())
}

fn torque(v: &str) -> Option<String> {
    parse_torque(v).map(|n| n.to_string())
}

fn cargo(v: &str) -> Option<String> {
    parse_volume(v).map(|n| n.to_string())
}

fn weight(v: &str) -> Option<String> {
    parse_weight(v).map(|n| n.to_string())
}

/// Labels whose raw text is not in the schema but whose parsed number is.
const PARSED_ONLY: &[(&str, &str, Parser)] = &[
    ("fair market price", "price", price),
    ("horsepower", "hp", horsepower),
    ("torque", "torque_lbft", torque),
    ("cargo volume", "cargo_cuft", cargo),
    ("curb weight", "curb_weight_lbs", weight),
];

const FUEL_ECONOMY: &str = "fuel economy";

fn spec_index(column: &str) -> Option<usize> {
    SPEC_INDEX.get(&column.to_lowercase()).copied()
}

pub fn is_trim_label(label: &str) -> bool {
    TRIM_LABEL_RE.is_match(label)
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One row of [`SPEC_COLUMNS`] per trim of every body type.
///
/// Duplicate labels keep their first occurrence. Missing values are blank.
pub fn flatten_scrape(scrape: &RawScrape, warnings: &LabelWarnings) -> Vec<Vec<String>> {
    let mut rows = Vec::new();

    for record in &scrape.records {
        if record.trims.is_empty() {
            continue;
        }

        let mut seen = HashSet::new();
        let mut labelled = Vec::new();
        for spec in &record.rows {
            let label = canonical_label(&spec.label);
            if !seen.insert(label.clone()) {
                continue;
            }
            if is_trim_label(&spec.label) {
                tracing::warn!(label = %spec.label, "Skipping trim-name label");
                continue;
            }
            labelled.push((label, spec));
        }

        for (idx, trim) in record.trims.iter().enumerate() {
            let mut row = vec![String::new(); SPEC_COLUMNS.len()];
            row[0] = scrape.target.make.clone();
            row[1] = scrape.target.model.clone();
            row[2] = scrape.target.year.to_string();
            row[3] = record.bodytype.clone();
            row[4] = trim.clone();

            for (label, spec) in &labelled {
                let value = spec.values.get(idx).map(String::as_str).unwrap_or("");

                if let Some((_, column, parse)) = PARSED_ONLY.iter().find(|(l, _, _)| l == label) {
                    if let Some(i) = spec_index(column) {
                        row[i] = parse(value).unwrap_or_default();
                    }
                } else if label == FUEL_ECONOMY {
                    let fuel = parse_fuel_economy(value);
                    row[6] = opt(fuel.city);
                    row[7] = opt(fuel.highway);
                    row[8] = opt(fuel.combined);
                } else if let Some(i) = spec_index(label).filter(|i| *i >= SPEC_KEY_COLUMNS.len()) {
                    row[i] = value.to_string();
                } else {
                    warnings.warn_once(&spec.label);
                }
            }
            rows.push(row);
        }
    }
    rows
}

/// One row of [`REVIEW_COLUMNS`].
pub fn flatten_review(data: &ReviewData) -> Vec<String> {
    let mut row = vec![String::new(); REVIEW_COLUMNS.len()];
    row[0] = data.make.clone();
    row[1] = data.model.clone();
    row[2] = data.year.to_string();

    if let Some(consumer) = &data.consumer_review {
        row[3] = opt(consumer.overall_rating);
        row[4] = opt(consumer.review_count);
        row[5] = opt(consumer.recommend_percentage);
        for (offset, star) in (1..=5u8).rev().enumerate() {
            row[6 + offset] = opt(consumer.star_distribution.get(&star));
        }
        for (offset, category) in REVIEW_CATEGORIES.iter().enumerate() {
            row[11 + offset] = opt(consumer.category_ratings.get(*category));
        }
    }

    if let Some(expert) = &data.expert_review {
        row[17] = opt(expert.expert_rating);
        row[18] = expert.ranking.clone().unwrap_or_default();
        row[19] = expert.pros.join(" | ");
        row[20] = expert.cons.join(" | ");
    }
    row
}
