use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{StoreError, StoreResult};

/// One managed item. Field order here is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub topic: String,
    pub category: String,
    pub description: String,
    pub importance: String,
}

impl Record {
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Topic => &self.topic,
            Field::Category => &self.category,
            Field::Description => &self.description,
            Field::Importance => &self.importance,
        }
    }

    pub fn text_fields(&self) -> [&str; 4] {
        Field::ALL.map(|field| self.field(field))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Topic,
    Category,
    Description,
    Importance,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Topic,
        Field::Category,
        Field::Description,
        Field::Importance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Topic => "topic",
            Field::Category => "category",
            Field::Description => "description",
            Field::Importance => "importance",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::Topic => "Topic",
            Field::Category => "Category",
            Field::Description => "Description",
            Field::Importance => "Importance",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied fields for a record that does not have an id yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    pub topic: String,
    pub category: String,
    pub description: String,
    pub importance: String,
}

impl RecordDraft {
    pub fn new(
        topic: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
        importance: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            category: category.into(),
            description: description.into(),
            importance: importance.into(),
        }
    }

    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Topic => &self.topic,
            Field::Category => &self.category,
            Field::Description => &self.description,
            Field::Importance => &self.importance,
        }
    }

    pub fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Topic => &mut self.topic,
            Field::Category => &mut self.category,
            Field::Description => &mut self.description,
            Field::Importance => &mut self.importance,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Trims every field and rejects the draft at the first blank one.
    pub(crate) fn into_record(self, id: u64) -> StoreResult<Record> {
        for field in Field::ALL {
            if self.field(field).trim().is_empty() {
                return Err(StoreError::Validation { field });
            }
        }
        Ok(Record {
            id,
            topic: self.topic.trim().to_owned(),
            category: self.category.trim().to_owned(),
            description: self.description.trim().to_owned(),
            importance: self.importance.trim().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn draft_trims_fields_into_record() {
        let record = RecordDraft::new("  Rust ", "lang", "\tsystems\n", " high")
            .into_record(7)
            .expect("valid draft");
        assert_eq!(record.id, 7);
        assert_eq!(record.text_fields(), ["Rust", "lang", "systems", "high"]);
    }

    #[test]
    fn draft_reports_first_blank_field() {
        let err = RecordDraft::new("a", "   ", "", "d")
            .into_record(1)
            .unwrap_err();
        assert_matches!(
            err,
            StoreError::Validation {
                field: Field::Category
            }
        );
        assert_eq!(err.to_string(), "category cannot be empty");
    }

    #[test]
    fn serializes_keys_in_declared_order() -> anyhow::Result<()> {
        let record = RecordDraft::new("t", "c", "d", "i").into_record(3)?;
        let json = serde_json::to_string(&record)?;
        assert_eq!(
            json,
            r#"{"id":3,"topic":"t","category":"c","description":"d","importance":"i"}"#
        );
        Ok(())
    }
}
