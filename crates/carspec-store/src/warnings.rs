use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Remembers which unrecognized spec labels have already been reported.
///
/// Clones share one set, so a single collector can be handed to every
/// exporter of a run and each label is logged at most once.
#[derive(Debug, Clone, Default)]
pub struct LabelWarnings {
    seen: Arc<Mutex<HashSet<String>>>,
}

impl LabelWarnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `label` unless it was reported before. Returns true if it logged.
    pub fn warn_once(&self, label: &str) -> bool {
        let first = match self.seen.lock() {
            Ok(mut seen) => seen.insert(label.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(label.to_string()),
        };
        if first {
            tracing::warn!(label, "Spec label not in CSV schema, ignoring");
        }
        first
    }

    pub fn len(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
