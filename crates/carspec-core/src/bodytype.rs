//! Body-type tab naming and canonical categorisation.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{BodyCategory, BodyTypeTab};

pub(crate) static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Selection-state and counter noise stripped from tab names, in order.
static NAME_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\(\d+\)",
        r"\d+$",
        r"unselected",
        r"selected",
        r"inactive",
        r"active",
        r"tab",
        r"button",
        r"^\d+\s*",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
    .collect()
});

/// Substring → display name. First hit wins.
const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("sedan", "Sedan"),
    ("suv", "SUV"),
    ("coupe", "Coupe"),
    ("convertible", "Convertible"),
    ("hatchback", "Hatchback"),
    ("wagon", "Wagon"),
    ("truck", "Truck"),
    ("van", "Van"),
    ("minivan", "Minivan"),
    ("pickup", "Pickup Truck"),
    ("sport utility", "SUV"),
    ("4dr", "4-Door"),
    ("2dr", "2-Door"),
];

/// Words that mark a clickable element as a body-type selector in the
/// last-resort scan.
pub const COMMON_BODY_WORDS: &[&str] = &[
    "sedan",
    "suv",
    "coupe",
    "hatchback",
    "convertible",
    "wagon",
    "truck",
    "van",
];

/// Name of the implicit tab when a page has no body-type selector.
pub const DEFAULT_TAB: &str = "Default";

/// Normalize a raw tab label into a display name. Empty when nothing is left.
pub fn clean_tab_name(raw: &str) -> String {
    let mut name = WHITESPACE_RE.replace_all(raw, " ").trim().to_string();
    for re in NAME_NOISE.iter() {
        name = re.replace_all(&name, "").into_owned();
    }

    let lower = name.to_lowercase();
    if let Some((_, display)) = DISPLAY_NAMES.iter().find(|(key, _)| lower.contains(key)) {
        return (*display).to_string();
    }

    name.trim_matches(|c| c == ' ' || c == '-' || c == ':')
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// An ordered substring → category rule.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub pattern: String,
    pub category: BodyCategory,
}

impl CategoryRule {
    pub fn new(pattern: impl Into<String>, category: BodyCategory) -> Self {
        Self {
            pattern: pattern.into().to_lowercase(),
            category,
        }
    }
}

static FOUR_DOOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b4d\b|\b4 door\b|\b4-door\b").unwrap());
static TWO_DOOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b2d\b|\b2 door\b|\b2-door\b").unwrap());
static FIVE_DOOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b5d\b|\b5 door\b|\b5-door\b").unwrap());

const TRIM_LEVEL_WORDS: &[&str] = &["le", "se", "xle", "limited", "premium", "sport"];

/// Maps tab labels onto [`BodyCategory`].
///
/// Override rules (brand naming quirks) run before the generic keyword
/// table. Both are plain data; add a rule with [`Self::with_override`].
#[derive(Debug, Clone)]
pub struct BodyTypeDetector {
    overrides: Vec<CategoryRule>,
    keywords: Vec<CategoryRule>,
}

impl Default for BodyTypeDetector {
    fn default() -> Self {
        use BodyCategory::*;

        let overrides = [
            ("wagon", Wagon),
            ("touring", Wagon),
            ("sportwagon", Wagon),
            ("gran turismo", Sedan),
            ("gt", Sedan),
            ("gran coupe", Sedan),
            ("4 series gran coupe", Sedan),
        ];

        let table: &[(BodyCategory, &[&str])] = &[
            (Sedan, &["sedan", "sedans", "4 door", "4-door", "4d"]),
            (Suv, &["suv", "suvs", "crossover", "crossovers", "sport utility"]),
            (Wagon, &["wagon", "wagons", "estate", "touring", "sportwagon"]),
            (Coupe, &["coupe", "coupes", "2 door", "2-door", "2d"]),
            (Convertible, &["convertible", "convertibles", "cabriolet", "roadster"]),
            (Truck, &["truck", "pickup", "pickups"]),
            (Van, &["van", "minivan", "vans", "minivans"]),
            (Hatchback, &["hatchback", "hatchbacks", "5 door", "5-door", "5d"]),
            (Hybrid, &["hybrid", "hev", "plugin", "plug-in"]),
            (Electric, &["electric", "ev", "bev", "electric vehicle"]),
            (Performance, &["m performance", "amg", "s line", "f sport", "type r", "gt"]),
            (Default, &["default", "standard", "base"]),
        ];

        Self {
            overrides: overrides
                .into_iter()
                .map(|(p, c)| CategoryRule::new(p, c))
                .collect(),
            keywords: table
                .iter()
                .flat_map(|(c, words)| words.iter().map(move |w| CategoryRule::new(*w, *c)))
                .collect(),
        }
    }
}

impl BodyTypeDetector {
    /// Append an override rule. Later rules have lower priority.
    pub fn with_override(mut self, pattern: impl Into<String>, category: BodyCategory) -> Self {
        self.overrides.push(CategoryRule::new(pattern, category));
        self
    }

    pub fn detect(&self, label: &str) -> BodyCategory {
        let lower = label.to_lowercase();

        let rule_hit = self
            .overrides
            .iter()
            .chain(self.keywords.iter())
            .find(|r| lower.contains(&r.pattern));
        if let Some(rule) = rule_hit {
            return rule.category;
        }

        if FOUR_DOOR_RE.is_match(&lower) {
            return BodyCategory::Sedan;
        }
        if TWO_DOOR_RE.is_match(&lower) {
            return BodyCategory::Coupe;
        }
        if FIVE_DOOR_RE.is_match(&lower) {
            return BodyCategory::Hatchback;
        }

        if TRIM_LEVEL_WORDS.iter().any(|w| lower.contains(w)) {
            return BodyCategory::Sedan;
        }

        BodyCategory::Default
    }

    /// Categorise from the raw label; cleaning can drop the words an
    /// override matches on ("4 Series Gran Coupe" cleans to "Coupe").
    pub fn tab(&self, name: &str, raw_label: &str) -> BodyTypeTab {
        BodyTypeTab {
            name: name.to_string(),
            raw_label: raw_label.to_string(),
            canonical_category: self.detect(raw_label),
        }
    }

    /// Group tab names by category, dropping a name whose words overlap an
    /// already-kept name of the same category by more than 70%.
    pub fn categorize_tabs(&self, tabs: &[BodyTypeTab]) -> BTreeMap<BodyCategory, Vec<String>> {
        let mut groups: BTreeMap<BodyCategory, Vec<String>> = BTreeMap::new();
        for tab in tabs {
            let group = groups.entry(tab.canonical_category).or_default();
            if !group.iter().any(|kept| word_similarity(&tab.name, kept) > 0.7) {
                group.push(tab.name.clone());
            }
        }
        groups
    }
}

fn word_similarity(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let wa: HashSet<&str> = a_lower.split_whitespace().collect();
    let wb: HashSet<&str> = b_lower.split_whitespace().collect();
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    wa.intersection(&wb).count() as f64 / wa.len().max(wb.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_tab_name_maps_known_styles() {
        assert_eq!(clean_tab_name("Sedan (3)"), "Sedan");
        assert_eq!(clean_tab_name("  suv selected "), "SUV");
        assert_eq!(clean_tab_name("Sport Utility"), "SUV");
        assert_eq!(clean_tab_name("Crew Cab Pickup"), "Pickup Truck");
        assert_eq!(clean_tab_name("Hatchback\n  tab"), "Hatchback");
    }

    #[test]
    fn test_clean_tab_name_title_cases_residual() {
        assert_eq!(clean_tab_name("gran turismo unselected"), "Gran Turismo");
        assert_eq!(clean_tab_name("gran coupe unselected"), "Coupe");
        assert_eq!(clean_tab_name("- xdrive inactive :"), "Xdrive");
        assert_eq!(clean_tab_name("2 hybrid 4"), "Hybrid");
        assert_eq!(clean_tab_name("active"), "");
    }

    #[test]
    fn test_detect_keyword_table() {
        let d = BodyTypeDetector::default();
        assert_eq!(d.detect("Sedan"), BodyCategory::Sedan);
        assert_eq!(d.detect("SUV"), BodyCategory::Suv);
        assert_eq!(d.detect("Convertible"), BodyCategory::Convertible);
        assert_eq!(d.detect("Cabriolet"), BodyCategory::Convertible);
        assert_eq!(d.detect("Crew Cab Pickup"), BodyCategory::Truck);
        assert_eq!(d.detect("Minivan"), BodyCategory::Van);
        assert_eq!(d.detect("Hatchback"), BodyCategory::Hatchback);
        assert_eq!(d.detect("Hybrid"), BodyCategory::Hybrid);
        assert_eq!(d.detect("AMG"), BodyCategory::Performance);
    }

    #[test]
    fn test_overrides_run_first() {
        let d = BodyTypeDetector::default();
        assert_eq!(d.detect("3 Series Touring"), BodyCategory::Wagon);
        assert_eq!(d.detect("6 Series Gran Turismo"), BodyCategory::Sedan);
        assert_eq!(d.detect("4 Series Gran Coupe"), BodyCategory::Sedan);
        assert_eq!(d.detect("GT Line"), BodyCategory::Sedan);
    }

    #[test]
    fn test_custom_override() {
        let d = BodyTypeDetector::default().with_override("shooting brake", BodyCategory::Wagon);
        assert_eq!(d.detect("CLA Shooting Brake"), BodyCategory::Wagon);
    }

    #[test]
    fn test_fallbacks() {
        let d = BodyTypeDetector::default();
        assert_eq!(d.detect("Limited"), BodyCategory::Sedan);
        assert_eq!(d.detect("Xdrive"), BodyCategory::Default);
        assert_eq!(d.detect("Default"), BodyCategory::Default);
    }

    #[test]
    fn test_categorize_tabs_drops_near_duplicates() {
        let d = BodyTypeDetector::default();
        let tabs = vec![
            d.tab("Sedan", "Sedan"),
            d.tab("sedan", "sedan selected"),
            d.tab("SUV", "SUV (2)"),
            d.tab("Coupe", "Coupe"),
        ];
        let groups = d.categorize_tabs(&tabs);
        assert_eq!(groups[&BodyCategory::Sedan], vec!["Sedan"]);
        assert_eq!(groups[&BodyCategory::Suv], vec!["SUV"]);
        assert_eq!(groups[&BodyCategory::Coupe], vec!["Coupe"]);
    }

    #[test]
    fn test_tab_category_comes_from_raw_label() {
        let d = BodyTypeDetector::default();
        let raw = "4 Series Gran Coupe";
        let tab = d.tab(&clean_tab_name(raw), raw);
        assert_eq!(tab.name, "Coupe");
        assert_eq!(tab.canonical_category, BodyCategory::Sedan);

        let groups = d.categorize_tabs(&[tab, d.tab("Coupe", "2 Door Coupe")]);
        assert_eq!(groups[&BodyCategory::Sedan], vec!["Coupe"]);
        assert_eq!(groups[&BodyCategory::Coupe], vec!["Coupe"]);
    }
}
