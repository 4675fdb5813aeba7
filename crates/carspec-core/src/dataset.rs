use serde::Serialize;

/// Identity row of the four-table schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedVehicle {
    pub vehicle_id: i64,
    pub brand: String,
    pub model: String,
    pub year: u16,
    pub trim: String,
    pub body_type: String,
    pub fuel_type: Option<String>,
    pub drivetrain: Option<String>,
    pub transmission: Option<String>,
    pub engine: Option<String>,
    pub msrp: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VehicleSpecs {
    pub vehicle_id: i64,
    pub horsepower: Option<u32>,
    pub torque: Option<u32>,
    pub zero_to_sixty: Option<f64>,
    pub top_speed: Option<u32>,
    pub mpg_city: Option<u32>,
    pub mpg_highway: Option<u32>,
    pub mpg_combined: Option<u32>,
    pub curb_weight: Option<u32>,
    pub wheelbase: Option<f64>,
    pub cargo_space: Option<f64>,
    pub towing_capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct VehicleFeatures {
    pub vehicle_id: i64,
    pub leather_seats: Option<bool>,
    pub heated_seats: Option<bool>,
    pub heated_rear_seats: Option<bool>,
    pub ambient_lighting: Option<bool>,
    pub adaptive_headlights: Option<bool>,
    pub panorama_roof: Option<bool>,
    pub navigation: Option<bool>,
    pub parking_assist: Option<bool>,
    pub premium_audio: Option<bool>,
}

/// Placeholder for ratings with no scraped source yet.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VehicleScores {
    pub vehicle_id: i64,
    pub interior_quality: Option<f64>,
    pub sporty_design: Option<f64>,
    pub prestige: Option<f64>,
    pub performance: Option<f64>,
    pub market_value: Option<f64>,
}

impl VehicleScores {
    pub fn empty(vehicle_id: i64) -> Self {
        Self {
            vehicle_id,
            ..Self::default()
        }
    }
}

pub const TABLE_NAMES: [&str; 4] = [
    "vehicle",
    "vehicle_specs",
    "vehicle_features",
    "vehicle_scores",
];

/// The four normalized tables for one target, joined by `vehicle_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub vehicles: Vec<NormalizedVehicle>,
    pub specs: Vec<VehicleSpecs>,
    pub features: Vec<VehicleFeatures>,
    pub scores: Vec<VehicleScores>,
}

impl Dataset {
    pub fn push(
        &mut self,
        vehicle: NormalizedVehicle,
        specs: VehicleSpecs,
        features: VehicleFeatures,
        scores: VehicleScores,
    ) {
        self.vehicles.push(vehicle);
        self.specs.push(specs);
        self.features.push(features);
        self.scores.push(scores);
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// `{table_name, records}` document for one table.
    pub fn table(&self, name: &str) -> Result<serde_json::Value, serde_json::Error> {
        let records = match name {
            "vehicle" => serde_json::to_value(&self.vehicles)?,
            "vehicle_specs" => serde_json::to_value(&self.specs)?,
            "vehicle_features" => serde_json::to_value(&self.features)?,
            "vehicle_scores" => serde_json::to_value(&self.scores)?,
            _ => serde_json::Value::Null,
        };
        Ok(serde_json::json!({ "table_name": name, "records": records }))
    }

    /// All four table documents keyed by table name.
    pub fn tables(&self) -> Result<serde_json::Map<String, serde_json::Value>, serde_json::Error> {
        TABLE_NAMES
            .iter()
            .map(|name| Ok(((*name).to_string(), self.table(name)?)))
            .collect()
    }

    pub fn record_counts(&self) -> serde_json::Value {
        serde_json::json!({
            "vehicle": self.vehicles.len(),
            "vehicle_specs": self.specs.len(),
            "vehicle_features": self.features.len(),
            "vehicle_scores": self.scores.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(id: i64) -> NormalizedVehicle {
        NormalizedVehicle {
            vehicle_id: id,
            brand: "Toyota".into(),
            model: "Camry".into(),
            year: 2020,
            trim: "LE".into(),
            body_type: "Sedan".into(),
            fuel_type: None,
            drivetrain: None,
            transmission: None,
            engine: Some("2.5L I4".into()),
            msrp: Some(24425),
        }
    }

    #[test]
    fn test_table_documents() {
        let mut ds = Dataset::default();
        ds.push(
            vehicle(7),
            VehicleSpecs {
                vehicle_id: 7,
                ..Default::default()
            },
            VehicleFeatures {
                vehicle_id: 7,
                ..Default::default()
            },
            VehicleScores::empty(7),
        );

        let doc = ds.table("vehicle").unwrap();
        assert_eq!(doc["table_name"], "vehicle");
        assert_eq!(doc["records"][0]["msrp"], 24425);
        assert!(doc["records"][0]["fuel_type"].is_null());

        let tables = ds.tables().unwrap();
        assert_eq!(tables.len(), 4);
        assert_eq!(tables["vehicle_scores"]["records"][0]["vehicle_id"], 7);
        assert_eq!(ds.record_counts()["vehicle_features"], 1);
    }
}
