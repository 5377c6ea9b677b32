use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::record::Field;

/// Failures surfaced by [`RecordStore`](super::RecordStore). The store never
/// changes its in-memory state when one of these is returned.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a valid record file: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("{field} cannot be empty")]
    Validation { field: Field },

    #[error("no record ids left above the current maximum")]
    IdsExhausted,
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
