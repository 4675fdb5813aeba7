//! Turns a ragged trim-comparison table into label/value rows.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::{MISSING_VALUE, RawSpecRow};

static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static ROLE_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[role="cell"]"#).unwrap());

static SAVE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^save\s*\d+\s+of\s+\d+\s*").unwrap());

const SKIP_LABELS: &[&str] = &["specifications", "features", "compare", "save", "see pricing"];
const SKIP_PREFIXES: &[&str] = &["save ", "see "];

/// Trim names and spec rows read from one comparison table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedTable {
    pub trims: Vec<String>,
    /// Every row holds exactly `trims.len()` values.
    pub rows: Vec<RawSpecRow>,
}

impl ExtractedTable {
    pub fn is_empty(&self) -> bool {
        self.trims.is_empty() && self.rows.is_empty()
    }
}

/// Remove the "Save N of M" bookmark prefix the site glues onto trim headers.
pub fn clean_trim_name(raw: &str) -> String {
    SAVE_PREFIX_RE.replace(raw.trim(), "").trim().to_string()
}

fn parse_table(html: &str) -> Html {
    if html.contains("<tr") && !html.contains("<table") {
        Html::parse_fragment(&format!("<table>{html}</table>"))
    } else {
        Html::parse_fragment(html)
    }
}

/// Text nodes stripped and concatenated without separator.
fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().map(str::trim).collect::<String>()
}

fn row_cells(row: &ElementRef<'_>, allow_role_cells: bool) -> Vec<String> {
    let ths: Vec<ElementRef<'_>> = row.select(&TH).collect();
    let tds: Vec<ElementRef<'_>> = row.select(&TD).collect();
    let cells: Vec<ElementRef<'_>> = match (ths.is_empty(), tds.is_empty()) {
        (false, false) => ths.into_iter().chain(tds).collect(),
        (true, false) => tds,
        (false, true) => ths,
        (true, true) if allow_role_cells => row.select(&ROLE_CELL).collect(),
        (true, true) => Vec::new(),
    };
    cells.iter().map(cell_text).collect()
}

fn is_boilerplate(label: &str) -> bool {
    let lower = label.to_lowercase();
    lower.is_empty()
        || SKIP_LABELS.contains(&lower.as_str())
        || SKIP_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Split a row into its label (first cell longer than one character) and the
/// cells after it. Boilerplate rows yield `None`.
fn split_row(cells: &[String]) -> Option<(&str, &[String])> {
    if cells.len() < 2 {
        return None;
    }
    let idx = cells.iter().position(|c| c.chars().count() > 1)?;
    let label = cells[idx].as_str();
    if is_boilerplate(label) {
        return None;
    }
    Some((label, &cells[idx + 1..]))
}

/// Number of `tr` rows in a table snapshot.
pub fn row_count(html: &str) -> usize {
    parse_table(html).select(&TR).count()
}

/// The snapshot with the most rows.
pub fn largest_table(tables: &[String]) -> Option<&str> {
    tables
        .iter()
        .max_by_key(|t| row_count(t))
        .map(String::as_str)
}

/// Extract a multi-trim comparison table.
///
/// The first surviving row carries the trim names: its label is the first
/// trim, its values the rest. The remaining rows are specifications.
pub fn extract_comparison_table(html: &str) -> ExtractedTable {
    let doc = parse_table(html);
    let mut raw: Vec<(String, Vec<String>)> = Vec::new();

    for row in doc.select(&TR) {
        let cells = row_cells(&row, true);
        let Some((label, rest)) = split_row(&cells) else {
            continue;
        };
        let values: Vec<String> = rest
            .iter()
            .map(|v| {
                if v.is_empty() {
                    MISSING_VALUE.to_string()
                } else {
                    v.clone()
                }
            })
            .collect();
        if values.is_empty() {
            continue;
        }
        raw.push((label.to_string(), values));
    }

    let Some((first_label, first_values)) = raw.first() else {
        return ExtractedTable::default();
    };

    let trims: Vec<String> = std::iter::once(first_label)
        .chain(first_values.iter())
        .map(|t| clean_trim_name(t))
        .filter(|t| !t.is_empty() && t != MISSING_VALUE)
        .collect();

    let n = trims.len();
    let rows = raw
        .into_iter()
        .skip(1)
        .map(|(label, values)| RawSpecRow::new(label, values, n))
        .collect();

    ExtractedTable { trims, rows }
}

/// Extract a single-style spec page: one label and its first non-empty value
/// per row, [`MISSING_VALUE`] when the row has none.
pub fn extract_style_specs(html: &str) -> Vec<(String, String)> {
    let doc = parse_table(html);
    doc.select(&TR)
        .filter_map(|row| {
            let cells = row_cells(&row, false);
            let (label, rest) = split_row(&cells)?;
            let value = rest
                .iter()
                .find(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| MISSING_VALUE.to_string());
            Some((label.to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPARISON: &str = r#"
        <table id="compare-trim-tables">
          <thead>
            <tr><th></th><th><span>Save</span><span>1 of 3</span><span>LE Sedan 4D</span></th>
                <th><span>Save</span><span>2 of 3</span><span>SE Sedan 4D</span></th>
                <th><span>Save</span><span>3 of 3</span><span>XSE Sedan 4D</span></th></tr>
          </thead>
          <tbody>
            <tr><td>See Pricing</td><td>x</td><td>y</td><td>z</td></tr>
            <tr><td>Specifications</td><td></td><td></td><td></td></tr>
            <tr><td>Horsepower</td><td>203 @ 6600 rpm</td><td>203 @ 6600 rpm</td><td>206 @ 6600 rpm</td></tr>
            <tr><td>Fuel Economy</td><td>City 29/Hwy 41/Comb 34 MPG</td><td></td></tr>
            <tr><td>Engine</td><td>2.5L I4</td><td>2.5L I4</td><td>2.5L I4</td><td>extra</td></tr>
            <tr><td>x</td></tr>
          </tbody>
        </table>"#;

    #[test]
    fn test_comparison_trims_and_rows() {
        let t = extract_comparison_table(COMPARISON);
        assert_eq!(t.trims, vec!["LE Sedan 4D", "SE Sedan 4D", "XSE Sedan 4D"]);
        let labels: Vec<&str> = t.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Horsepower", "Fuel Economy", "Engine"]);
        for row in &t.rows {
            assert_eq!(row.values.len(), 3);
        }
    }

    #[test]
    fn test_comparison_pads_and_truncates() {
        let t = extract_comparison_table(COMPARISON);
        let fuel = &t.rows[1];
        assert_eq!(fuel.values[0], "City 29/Hwy 41/Comb 34 MPG");
        assert_eq!(fuel.values[1], MISSING_VALUE);
        assert_eq!(fuel.values[2], MISSING_VALUE);
        let engine = &t.rows[2];
        assert_eq!(engine.values, vec!["2.5L I4", "2.5L I4", "2.5L I4"]);
    }

    #[test]
    fn test_inner_html_without_table_tag() {
        let inner = "<tbody><tr><th></th><th>Base</th><th>Sport</th></tr>\
                     <tr><td>Torque</td><td>180</td><td>200</td></tr></tbody>";
        let t = extract_comparison_table(inner);
        assert_eq!(t.trims, vec!["Base", "Sport"]);
        assert_eq!(t.rows[0].values, vec!["180", "200"]);
    }

    #[test]
    fn test_empty_table() {
        assert!(extract_comparison_table("<table></table>").is_empty());
        assert!(extract_comparison_table("").is_empty());
    }

    #[test]
    fn test_clean_trim_name() {
        assert_eq!(clean_trim_name("Save1 of 3LE Sedan 4D"), "LE Sedan 4D");
        assert_eq!(clean_trim_name("Save 2 of 3 A3 Premium"), "A3 Premium");
        assert_eq!(clean_trim_name("  Touring  "), "Touring");
    }

    #[test]
    fn test_style_specs_first_non_empty() {
        let html = "<table><tr><td>Horsepower</td><td></td><td>158</td></tr>\
                    <tr><td>Engine</td><td></td></tr>\
                    <tr><td>Compare</td><td>x</td></tr></table>";
        let specs = extract_style_specs(html);
        assert_eq!(
            specs,
            vec![
                ("Horsepower".to_string(), "158".to_string()),
                ("Engine".to_string(), MISSING_VALUE.to_string()),
            ]
        );
    }

    #[test]
    fn test_largest_table() {
        let tables = vec![
            "<table><tr><td>a</td></tr></table>".to_string(),
            "<table><tr><td>a</td></tr><tr><td>b</td></tr></table>".to_string(),
        ];
        assert_eq!(largest_table(&tables), Some(tables[1].as_str()));
        assert_eq!(largest_table(&[]), None);
    }
}
