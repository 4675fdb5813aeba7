//! Pure conversions from raw spec text to typed values.
//!
//! Every function is total: unparseable or empty input yields `None`, never an
//! error. Missing data propagates as an unset field. Numeric parsers only
//! accept a number at the start of the trimmed text.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static LEADING_INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)").unwrap());
static LEADING_DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)").unwrap());
static LEADING_GROUPED_INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d[\d,]*)").unwrap());

static CITY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)City\s*(\d+)").unwrap());
static HWY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Hwy\s*(\d+)").unwrap());
static COMB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Comb(?:ined)?\s*(\d+)").unwrap());
static MPGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(\d+)\s*MPGe").unwrap());
static KWH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*kWh\s*/\s*100\s*mi").unwrap());
static MPG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(\d+)\s*mpg\b").unwrap());
static BARE_INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

/// kWh per gallon-equivalent (33.7) times 100 miles.
const KWH_PER_100MI_TO_MPGE: f64 = 3370.0;

/// Bare numbers outside this range are not fuel-economy figures.
const PLAUSIBLE_MPG: std::ops::RangeInclusive<u32> = 5..=200;

/// City / highway / combined miles per gallon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FuelEconomy {
    pub city: Option<u32>,
    pub highway: Option<u32>,
    pub combined: Option<u32>,
}

impl FuelEconomy {
    pub fn combined_only(combined: u32) -> Self {
        Self {
            combined: Some(combined),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.highway.is_none() && self.combined.is_none()
    }
}

fn capture_u32(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Horsepower: the leading integer, e.g. `"203 @ 6600 rpm"` → 203.
pub fn parse_power(text: &str) -> Option<u32> {
    capture_u32(&LEADING_INT_RE, text.trim())
}

/// Torque in lb-ft, same shape as horsepower.
pub fn parse_torque(text: &str) -> Option<u32> {
    parse_power(text)
}

/// 0-60 time in seconds.
pub fn parse_acceleration(text: &str) -> Option<f64> {
    parse_decimal(text)
}

/// Top speed in mph.
pub fn parse_top_speed(text: &str) -> Option<u32> {
    capture_u32(&LEADING_INT_RE, text.trim())
}

pub fn parse_fuel_economy(text: &str) -> FuelEconomy {
    let text = text.trim();
    if text.is_empty() {
        return FuelEconomy::default();
    }

    let labeled = FuelEconomy {
        city: capture_u32(&CITY_RE, text),
        highway: capture_u32(&HWY_RE, text),
        combined: capture_u32(&COMB_RE, text),
    };
    if !labeled.is_empty() {
        return labeled;
    }

    if let Some(mpge) = capture_u32(&MPGE_RE, text) {
        return FuelEconomy::combined_only(mpge);
    }

    if let Some(kwh) = KWH_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|k| *k > 0.0)
    {
        return FuelEconomy::combined_only((KWH_PER_100MI_TO_MPGE / kwh).round() as u32);
    }

    if let Some(mpg) = capture_u32(&MPG_RE, text) {
        return FuelEconomy::combined_only(mpg);
    }

    if BARE_INT_RE.is_match(text) {
        return text
            .parse::<u32>()
            .ok()
            .filter(|n| PLAUSIBLE_MPG.contains(n))
            .map(FuelEconomy::combined_only)
            .unwrap_or_default();
    }

    FuelEconomy::default()
}

/// Weight in pounds, thousands separators stripped: `"3,310 lbs"` → 3310.
pub fn parse_weight(text: &str) -> Option<u32> {
    let raw = LEADING_GROUPED_INT_RE
        .captures(text.trim())?
        .get(1)?
        .as_str()
        .replace(',', "");
    raw.parse().ok()
}

/// Length or volume magnitude, unit ignored and not converted.
pub fn parse_dimension(text: &str) -> Option<f64> {
    parse_decimal(text)
}

pub fn parse_volume(text: &str) -> Option<f64> {
    parse_decimal(text)
}

fn parse_decimal(text: &str) -> Option<f64> {
    LEADING_DECIMAL_RE.captures(text.trim())?.get(1)?.as_str().parse().ok()
}

/// Price in whole dollars: `"$24,425"` → 24425.
pub fn parse_price(text: &str) -> Option<u32> {
    let cleaned = text.replace(['$', ','], "");
    let value: f64 = parse_decimal(&cleaned)?;
    Some(value.trunc() as u32)
}

/// `Standard` and `Optional` mean available. Anything else is unknown, not false.
pub fn parse_feature_flag(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("standard") || text.eq_ignore_ascii_case("optional") {
        Some(true)
    } else {
        None
    }
}
