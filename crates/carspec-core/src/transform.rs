//! Raw trim records → the four normalized tables.

use std::collections::HashMap;

use tracing::warn;

use crate::dataset::{Dataset, NormalizedVehicle, VehicleFeatures, VehicleScores, VehicleSpecs};
use crate::labels::canonical_label;
use crate::models::{RawSpecRow, ScrapeTarget, TrimRecord, vehicle_id};
use crate::table::clean_trim_name;
use crate::value_parser::{
    FuelEconomy, parse_acceleration, parse_dimension, parse_feature_flag, parse_fuel_economy,
    parse_power, parse_price, parse_top_speed, parse_torque, parse_volume, parse_weight,
};

const LEATHER_SEATS: &[&str] = &["leather seats"];
const HEATED_SEATS: &[&str] = &["heated seats", "heated front seats"];
const HEATED_REAR_SEATS: &[&str] = &["heated rear seats"];
const AMBIENT_LIGHTING: &[&str] = &["ambient lighting", "interior ambient lighting"];
const ADAPTIVE_HEADLIGHTS: &[&str] = &["adaptive headlights", "adaptive front headlights"];
const PANORAMA_ROOF: &[&str] = &[
    "panorama moon roof",
    "panoramic moon roof",
    "panorama roof",
    "panoramic roof",
    "moonroof",
    "moon roof",
    "sunroof",
];
const NAVIGATION: &[&str] = &["navigation system", "navigation", "gps navigation"];
const PARKING_ASSIST: &[&str] = &[
    "parking assist",
    "park assist",
    "parking sensors",
    "rear parking sensors",
];
const PREMIUM_AUDIO: &[&str] = &[
    "premium radio",
    "premium audio",
    "premium sound",
    "premium sound system",
];

/// Canonical label → row. The first row wins on duplicate labels.
struct SpecLookup<'a> {
    rows: HashMap<String, &'a RawSpecRow>,
}

impl<'a> SpecLookup<'a> {
    fn new(rows: &'a [RawSpecRow]) -> Self {
        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            map.entry(canonical_label(&row.label)).or_insert(row);
        }
        Self { rows: map }
    }

    fn get(&self, label: &str, trim_idx: usize) -> Option<&'a str> {
        self.rows.get(&canonical_label(label))?.value(trim_idx)
    }

    fn text(&self, label: &str, trim_idx: usize) -> Option<String> {
        self.get(label, trim_idx).map(str::to_string)
    }

    fn parsed<T>(&self, label: &str, trim_idx: usize, parse: fn(&str) -> Option<T>) -> Option<T> {
        self.get(label, trim_idx).and_then(parse)
    }

    /// First synonym that carries a value decides the flag.
    fn feature(&self, synonyms: &[&str], trim_idx: usize) -> Option<bool> {
        synonyms
            .iter()
            .find_map(|name| self.get(name, trim_idx))
            .and_then(parse_feature_flag)
    }
}

/// Builds the four-table [`Dataset`] from scraped trim records.
#[derive(Debug, Clone, Default)]
pub struct SchemaTransformer;

impl SchemaTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Transform every body type of one target. Body types without trims or
    /// rows are skipped with a warning.
    pub fn transform(&self, target: &ScrapeTarget, records: &[TrimRecord]) -> Dataset {
        let mut dataset = Dataset::default();
        for record in records {
            self.transform_record(&mut dataset, target, record);
        }
        dataset
    }

    pub fn transform_record(
        &self,
        dataset: &mut Dataset,
        target: &ScrapeTarget,
        record: &TrimRecord,
    ) {
        if record.trims.is_empty() || record.rows.is_empty() {
            warn!(
                make = %target.make,
                model = %target.model,
                year = target.year,
                bodytype = %record.bodytype,
                "No trims or specifications for body type, skipping"
            );
            return;
        }

        let lookup = SpecLookup::new(&record.rows);

        for (idx, raw_trim) in record.trims.iter().enumerate() {
            let trim = clean_trim_name(raw_trim);
            let id = vehicle_id(&target.make, &target.model, target.year, &trim, &record.bodytype);

            let vehicle = NormalizedVehicle {
                vehicle_id: id,
                brand: target.make.clone(),
                model: target.model.clone(),
                year: target.year,
                trim,
                body_type: record.bodytype.clone(),
                fuel_type: lookup.text("fuel type", idx),
                drivetrain: lookup.text("drivetrain", idx),
                transmission: lookup.text("transmission type", idx),
                engine: lookup.text("engine", idx),
                msrp: lookup.parsed("fair market price", idx, parse_price),
            };

            let fuel = lookup
                .get("fuel economy", idx)
                .map(parse_fuel_economy)
                .unwrap_or_else(FuelEconomy::default);

            let specs = VehicleSpecs {
                vehicle_id: id,
                horsepower: lookup.parsed("horsepower", idx, parse_power),
                torque: lookup.parsed("torque", idx, parse_torque),
                zero_to_sixty: lookup.parsed("0 - 60", idx, parse_acceleration),
                top_speed: lookup.parsed("top speed", idx, parse_top_speed),
                mpg_city: fuel.city,
                mpg_highway: fuel.highway,
                mpg_combined: fuel.combined,
                curb_weight: lookup.parsed("curb weight", idx, parse_weight),
                wheelbase: lookup.parsed("wheel base", idx, parse_dimension),
                cargo_space: lookup.parsed("cargo volume", idx, parse_volume),
                towing_capacity: lookup.parsed("towing capacity", idx, parse_weight),
            };

            let features = VehicleFeatures {
                vehicle_id: id,
                leather_seats: lookup.feature(LEATHER_SEATS, idx),
                heated_seats: lookup.feature(HEATED_SEATS, idx),
                heated_rear_seats: lookup.feature(HEATED_REAR_SEATS, idx),
                ambient_lighting: lookup.feature(AMBIENT_LIGHTING, idx),
                adaptive_headlights: lookup.feature(ADAPTIVE_HEADLIGHTS, idx),
                panorama_roof: lookup.feature(PANORAMA_ROOF, idx),
                navigation: lookup.feature(NAVIGATION, idx),
                parking_assist: lookup.feature(PARKING_ASSIST, idx),
                premium_audio: lookup.feature(PREMIUM_AUDIO, idx),
            };

            dataset.push(vehicle, specs, features, VehicleScores::empty(id));
        }
    }
}
