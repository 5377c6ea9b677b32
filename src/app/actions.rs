use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::store::{LoadOutcome, Record, RecordDraft, RecordStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

/// Advisory message emitted after every store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub level: StatusLevel,
    pub message: String,
}

impl StatusReport {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warn,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == StatusLevel::Error
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A status report plus whatever the operation produced on success.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub report: StatusReport,
    pub value: Option<T>,
}

impl<T> Outcome<T> {
    fn ok(value: T, report: StatusReport) -> Self {
        Self {
            report,
            value: Some(value),
        }
    }

    fn failed(report: StatusReport) -> Self {
        Self {
            report,
            value: None,
        }
    }
}

/// Runs store operations on behalf of a presentation layer and turns their
/// results into status reports.
pub struct ActionDispatcher<'a> {
    store: &'a mut RecordStore,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(store: &'a mut RecordStore) -> Self {
        Self { store }
    }

    pub fn load(&mut self, path: &Path) -> Outcome<LoadOutcome> {
        match self.store.load(path) {
            Ok(outcome @ LoadOutcome::Loaded { count }) => {
                tracing::info!(path = %path.display(), count, "loaded records");
                Outcome::ok(
                    outcome,
                    StatusReport::info(format!(
                        "Loaded {} from {}",
                        records_label(count),
                        path.display()
                    )),
                )
            }
            Ok(outcome @ LoadOutcome::Missing) => {
                tracing::info!(path = %path.display(), "record file missing, starting empty");
                Outcome::ok(
                    outcome,
                    StatusReport::warn(format!(
                        "{} not found; starting with an empty dataset",
                        path.display()
                    )),
                )
            }
            Err(err) => Outcome::failed(failure("load", &err)),
        }
    }

    pub fn reload(&mut self) -> Outcome<LoadOutcome> {
        match self.store.current_path().map(Path::to_path_buf) {
            Some(path) => self.load(&path),
            None => Outcome::failed(StatusReport::warn("No current file to reload")),
        }
    }

    pub fn save(&mut self) -> Outcome<()> {
        let Some(path) = self.store.current_path().map(Path::to_path_buf) else {
            return Outcome::failed(StatusReport::warn(
                "No current file; export to choose a location",
            ));
        };
        match self.store.persist(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), count = self.store.len(), "saved records");
                Outcome::ok(
                    (),
                    StatusReport::info(format!(
                        "Saved {} to {}",
                        records_label(self.store.len()),
                        path.display()
                    )),
                )
            }
            Err(err) => Outcome::failed(failure("save", &err)),
        }
    }

    pub fn export(&mut self, path: &Path) -> Outcome<()> {
        match self.store.persist(path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), count = self.store.len(), "exported records");
                Outcome::ok(
                    (),
                    StatusReport::info(format!(
                        "Exported {} to {}",
                        records_label(self.store.len()),
                        path.display()
                    )),
                )
            }
            Err(err) => Outcome::failed(failure("export", &err)),
        }
    }

    pub fn add(&mut self, draft: RecordDraft) -> Outcome<Record> {
        match self.store.insert_draft(draft) {
            Ok(record) => {
                tracing::info!(id = record.id, "added record");
                let report = StatusReport::info(format!("Added record #{}", record.id));
                Outcome::ok(record, report)
            }
            Err(err) => Outcome::failed(failure("add", &err)),
        }
    }

    pub fn remove(&mut self, ids: &HashSet<u64>) -> Outcome<usize> {
        let removed = self.store.remove(ids);
        tracing::info!(requested = ids.len(), removed, "removed records");
        let report = if removed == 0 {
            StatusReport::warn("No matching records to remove")
        } else {
            StatusReport::info(format!("Removed {}", records_label(removed)))
        };
        Outcome::ok(removed, report)
    }

    pub fn search(&mut self, term: &str) -> Outcome<usize> {
        let matches = self.store.set_search_term(term).len();
        if self.store.search_term().is_empty() {
            return Outcome::ok(matches, StatusReport::info("Search cleared"));
        }
        let report = StatusReport::info(format!(
            "{matches} {} for \"{}\"",
            if matches == 1 { "match" } else { "matches" },
            self.store.search_term()
        ));
        Outcome::ok(matches, report)
    }

    pub fn clear_search(&mut self) -> Outcome<usize> {
        let total = self.store.clear_search().len();
        Outcome::ok(total, StatusReport::info("Search cleared"))
    }
}

pub fn records_label(count: usize) -> String {
    if count == 1 {
        "1 record".to_string()
    } else {
        format!("{count} records")
    }
}

fn failure(operation: &'static str, err: &StoreError) -> StatusReport {
    match err {
        StoreError::Validation { .. } => {
            tracing::warn!(operation, %err, "rejected record input");
        }
        _ => {
            tracing::error!(operation, ?err, "record store operation failed");
        }
    }
    StatusReport::error(err.to_string())
}
