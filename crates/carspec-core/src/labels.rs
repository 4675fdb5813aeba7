//! Spec label aliases shared by the transformer and the CSV exporter.

/// Variant (lowercase) → canonical label (lowercase).
const LABEL_ALIASES: &[(&str, &str)] = &[
    ("literseather seats", "leather seats"),
    ("0 to 60", "0 - 60"),
    ("0-60", "0 - 60"),
    ("turning circle", "turning diameter"),
    ("wheelbase", "wheel base"),
];

/// Lowercased, whitespace-collapsed label with known variants redirected to
/// their canonical spelling.
pub fn canonical_label(label: &str) -> String {
    let lower = label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    LABEL_ALIASES
        .iter()
        .find(|(variant, _)| *variant == lower)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(lower)
}
