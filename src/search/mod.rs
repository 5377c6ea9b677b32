use crate::store::Record;

/// Normalised search predicate: trimmed and lowercased. An empty term matches
/// every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTerm {
    needle: String,
}

impl SearchTerm {
    pub fn new(raw: &str) -> Self {
        Self {
            needle: raw.trim().to_lowercase(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.needle
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        if self.is_empty() {
            return true;
        }
        record
            .text_fields()
            .iter()
            .any(|value| value.to_lowercase().contains(&self.needle))
    }
}

/// Positions of the records that belong in the view, in dataset order.
pub fn filter_positions(records: &[Record], term: &SearchTerm) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| term.matches(record))
        .map(|(idx, _)| idx)
        .collect()
}
