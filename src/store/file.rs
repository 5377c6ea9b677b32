use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::error::{StoreError, StoreResult};
use super::record::Record;

const TMP_SUFFIX: &str = ".tmp";

/// Reads a record file. `Ok(None)` means the file does not exist.
pub(crate) fn read_records(path: &Path) -> StoreResult<Option<Vec<Record>>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::io("reading", path, err)),
    };
    let records: Vec<Record> =
        serde_json::from_slice(&raw).map_err(|err| StoreError::parse(path, err.to_string()))?;

    let mut seen = HashSet::with_capacity(records.len());
    for record in &records {
        if !seen.insert(record.id) {
            return Err(StoreError::parse(
                path,
                format!("id {} appears more than once", record.id),
            ));
        }
    }
    Ok(Some(records))
}

/// Writes the records next to `path` first and renames over it, so a failed
/// write never leaves a truncated file behind.
pub(crate) fn write_records_atomic(path: &Path, records: &[Record]) -> StoreResult<()> {
    let json = serde_json::to_vec_pretty(records).map_err(|err| {
        StoreError::io("serialising records for", path, io::Error::other(err))
    })?;
    let tmp_path = tmp_path_for(path)?;
    if let Err(err) = write_synced(&tmp_path, &json) {
        discard_tmp(&tmp_path);
        return Err(StoreError::io("writing", &tmp_path, err));
    }
    if let Err(err) = fs::rename(&tmp_path, path) {
        discard_tmp(&tmp_path);
        return Err(StoreError::io("replacing", path, err));
    }
    Ok(())
}

/// Writes and flushes to disk so the rename never exposes an empty file.
fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn tmp_path_for(path: &Path) -> StoreResult<PathBuf> {
    let Some(name) = path.file_name() else {
        return Err(StoreError::io(
            "writing",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        ));
    };
    let mut tmp_name = OsString::from(name);
    tmp_name.push(TMP_SUFFIX);
    Ok(path.with_file_name(tmp_name))
}

fn discard_tmp(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(?err, path = %path.display(), "failed to remove temporary record file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn record(id: u64, topic: &str) -> Record {
        Record {
            id,
            topic: topic.into(),
            category: "cat".into(),
            description: "desc".into(),
            importance: "low".into(),
        }
    }

    #[test]
    fn missing_file_reads_as_none() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let records = read_records(&temp.path().join("absent.json"))?;
        assert!(records.is_none());
        Ok(())
    }

    #[test]
    fn writes_pretty_utf8_without_tmp_leftovers() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("data.json");
        write_records_atomic(&path, &[record(1, "数据")])?;

        let written = fs::read_to_string(&path)?;
        assert!(written.contains("\"topic\": \"数据\""), "got {written}");
        assert!(written.starts_with("[\n  {\n    \"id\": 1,"), "got {written}");
        assert!(!temp.path().join("data.json.tmp").exists());
        Ok(())
    }

    #[test]
    fn rejects_non_array_documents() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("data.json");
        fs::write(&path, r#"{"id": 1}"#)?;
        assert_matches!(read_records(&path), Err(StoreError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn rejects_records_missing_fields() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("data.json");
        fs::write(&path, r#"[{"id": 1, "topic": "t", "category": "c"}]"#)?;
        assert_matches!(read_records(&path), Err(StoreError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn rejects_duplicate_ids() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("data.json");
        write_records_atomic(&path, &[record(4, "a"), record(4, "b")])?;
        let err = read_records(&path).unwrap_err();
        assert_matches!(err, StoreError::Parse { ref reason, .. } if reason.contains("id 4"));
        Ok(())
    }

    #[test]
    fn ignores_unknown_keys() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("data.json");
        fs::write(
            &path,
            r#"[{"id": 2, "topic": "t", "category": "c", "description": "d", "importance": "i", "color": "red"}]"#,
        )?;
        let records = read_records(&path)?.expect("file exists");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 2);
        Ok(())
    }

    #[test]
    fn overwrites_existing_file_in_full() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("data.json");
        write_records_atomic(&path, &[record(1, "a"), record(2, "b"), record(3, "c")])?;
        write_records_atomic(&path, &[record(9, "z")])?;

        let records = read_records(&path)?.expect("file exists");
        assert_eq!(records, vec![record(9, "z")]);
        assert!(!temp.path().join("data.json.tmp").exists());
        Ok(())
    }

    #[test]
    fn write_into_missing_directory_fails() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("nope").join("data.json");
        assert_matches!(
            write_records_atomic(&path, &[record(1, "a")]),
            Err(StoreError::Io { .. })
        );
        assert!(!path.exists());
        Ok(())
    }
}
