pub mod app;
pub mod cli;
pub mod config;
pub mod highlight;
pub mod search;
pub mod store;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use store::{IdPolicy, LoadOutcome, Record, RecordDraft, RecordStore, StoreError};
