use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::search::{filter_positions, SearchTerm};

mod error;
mod file;
mod record;

pub use error::{StoreError, StoreResult};
pub use record::{Field, Record, RecordDraft};

/// How identifiers are handed out on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdPolicy {
    /// `1 + max(current ids)`. Deleting the top record frees its id again.
    #[default]
    MaxPlusOne,
    /// Never reissues an id seen since the last load, even after deletion.
    Monotonic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { count: usize },
    Missing,
}

/// The dataset, the active search term and the view derived from both.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    term: SearchTerm,
    view: Vec<usize>,
    current_path: Option<PathBuf>,
    id_policy: IdPolicy,
    highest_issued: u64,
}

impl RecordStore {
    pub fn new(id_policy: IdPolicy) -> Self {
        Self {
            id_policy,
            ..Self::default()
        }
    }

    /// Replaces the dataset with the contents of `path`. A missing file loads
    /// as an empty dataset; on any error nothing changes.
    pub fn load(&mut self, path: impl AsRef<Path>) -> StoreResult<LoadOutcome> {
        let path = path.as_ref();
        let (records, outcome) = match file::read_records(path)? {
            Some(records) => {
                let count = records.len();
                (records, LoadOutcome::Loaded { count })
            }
            None => (Vec::new(), LoadOutcome::Missing),
        };

        self.highest_issued = max_id(&records);
        self.records = records;
        self.term = SearchTerm::default();
        self.current_path = Some(path.to_path_buf());
        self.recompute_view();
        tracing::debug!(path = %path.display(), ?outcome, "loaded record file");
        Ok(outcome)
    }

    /// Writes the whole dataset to `path`, replacing the file atomically.
    pub fn persist(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        file::write_records_atomic(path, &self.records)?;
        tracing::debug!(path = %path.display(), count = self.records.len(), "persisted records");
        Ok(())
    }

    pub fn insert(
        &mut self,
        topic: &str,
        category: &str,
        description: &str,
        importance: &str,
    ) -> StoreResult<Record> {
        self.insert_draft(RecordDraft::new(topic, category, description, importance))
    }

    pub fn insert_draft(&mut self, draft: RecordDraft) -> StoreResult<Record> {
        let id = self.next_id().ok_or(StoreError::IdsExhausted)?;
        let record = draft.into_record(id)?;
        self.highest_issued = self.highest_issued.max(record.id);
        self.records.push(record.clone());
        self.recompute_view();
        tracing::debug!(id = record.id, "inserted record");
        Ok(record)
    }

    /// Drops every record whose id is in `ids` and returns how many went.
    pub fn remove(&mut self, ids: &HashSet<u64>) -> usize {
        let before = self.records.len();
        self.records.retain(|record| !ids.contains(&record.id));
        let removed = before - self.records.len();
        self.recompute_view();
        tracing::debug!(requested = ids.len(), removed, "removed records");
        removed
    }

    pub fn set_search_term(&mut self, term: &str) -> Vec<&Record> {
        self.term = SearchTerm::new(term);
        self.recompute_view();
        self.view()
    }

    pub fn clear_search(&mut self) -> Vec<&Record> {
        self.set_search_term("")
    }

    pub fn view(&self) -> Vec<&Record> {
        self.view.iter().map(|&idx| &self.records[idx]).collect()
    }

    pub fn view_len(&self) -> usize {
        self.view.len()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: u64) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn search_term(&self) -> &str {
        self.term.as_str()
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn id_policy(&self) -> IdPolicy {
        self.id_policy
    }

    /// The id the next successful insert will receive, or `None` once the
    /// id space above the current maximum is used up.
    pub fn next_id(&self) -> Option<u64> {
        let current = max_id(&self.records);
        match self.id_policy {
            IdPolicy::MaxPlusOne => current.checked_add(1),
            IdPolicy::Monotonic => current.max(self.highest_issued).checked_add(1),
        }
    }

    fn recompute_view(&mut self) {
        self.view = filter_positions(&self.records, &self.term);
    }
}

fn max_id(records: &[Record]) -> u64 {
    records.iter().map(|record| record.id).max().unwrap_or(0)
}
