use chrono::{DateTime, Utc};

/// Make a value safe to embed in a file name.
///
/// Keeps ASCII alphanumerics, `-` and `.`; everything else becomes `_`.
/// Example: `"Mercedes-Benz"` → `"Mercedes-Benz"`, `"CR V"` → `"CR_V"`
pub fn file_part(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Compact timestamp used in generated file names: `20240131_235959`.
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}
