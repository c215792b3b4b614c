//! Append-only JSON-lines file store.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sensorwatch_types::{DeviceId, NormalizedSample, ValidatedSample};
use tracing::{info, warn};

use super::{newest_first, SampleStore};
use crate::error::StoreError;

#[derive(Debug)]
struct Writer {
    file: Arc<File>,
    next_id: u64,
}

/// A store backed by one JSON object per line.
///
/// Existing records are loaded on open and numbering continues after the
/// highest stored id. Every insert is flushed and synced before it returns,
/// so a sample that has been broadcast survives a restart.
///
/// An id is spent as soon as an insert starts. A failed append is cut back
/// off the file, and the id is not handed out again.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    writer: tokio::sync::Mutex<Writer>,
    records: Mutex<Vec<NormalizedSample>>,
}

impl JsonlStore {
    /// Open (or create) the store at `path`.
    ///
    /// A final line that does not parse is the remains of an interrupted
    /// append: it is logged and truncated away. Any earlier bad line is
    /// reported as [`StoreError::Corrupt`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            load(&path)?
        } else {
            Vec::new()
        };
        let next_id = records.iter().map(|r| r.id).max().map_or(1, |id| id + 1);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        info!(
            path = %path.display(),
            records = records.len(),
            next_id,
            "Opened sample store"
        );

        Ok(Self {
            path,
            writer: tokio::sync::Mutex::new(Writer {
                file: Arc::new(file),
                next_id,
            }),
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn load(path: &Path) -> Result<Vec<NormalizedSample>, StoreError> {
    let contents = std::fs::read(path)?;
    let mut records = Vec::new();
    let mut offset = 0;
    let mut lines = contents.split_inclusive(|b| *b == b'\n').enumerate().peekable();

    while let Some((index, line)) = lines.next() {
        let start = offset;
        offset += line.len();
        if line.trim_ascii().is_empty() {
            continue;
        }
        match serde_json::from_slice(line) {
            Ok(record) => records.push(record),
            Err(source) if lines.peek().is_none() => {
                warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %source,
                    "Dropping incomplete trailing record"
                );
                OpenOptions::new()
                    .write(true)
                    .open(path)?
                    .set_len(start as u64)?;
            }
            Err(source) => {
                return Err(StoreError::Corrupt {
                    line: index + 1,
                    source,
                })
            }
        }
    }
    Ok(records)
}

/// Append one line and sync it. On failure the file is cut back to its
/// previous length.
fn append_line(file: &File, line: &[u8]) -> io::Result<()> {
    let len = file.metadata()?.len();
    let result = (&*file).write_all(line).and_then(|()| file.sync_data());
    if let Err(err) = &result {
        if let Err(rollback) = file.set_len(len) {
            warn!(error = %err, rollback_error = %rollback, "Could not roll back failed append");
        }
    }
    result
}

#[async_trait]
impl SampleStore for JsonlStore {
    async fn insert(&self, sample: ValidatedSample) -> Result<NormalizedSample, StoreError> {
        let mut writer = self.writer.lock().await;
        let id = writer.next_id;
        writer.next_id += 1;

        let record = NormalizedSample::from_validated(id, sample, Utc::now());
        let mut line = serde_json::to_vec(&record).map_err(StoreError::Encode)?;
        line.push(b'\n');

        let file = Arc::clone(&writer.file);
        tokio::task::spawn_blocking(move || append_line(&file, &line))
            .await
            .map_err(io::Error::other)??;

        self.records.lock().push(record.clone());
        Ok(record)
    }

    async fn recent(
        &self,
        device: Option<&DeviceId>,
        limit: usize,
    ) -> Result<Vec<NormalizedSample>, StoreError> {
        Ok(newest_first(&self.records.lock(), device, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn validated(device: i64, temperature: f64) -> ValidatedSample {
        ValidatedSample {
            generated_at: Utc::now(),
            device_id: DeviceId::from(device),
            temperature,
            humidity: 45.0,
        }
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.jsonl");

        {
            let store = JsonlStore::open(&path).unwrap();
            store.insert(validated(1, 20.0)).await.unwrap();
            store.insert(validated(2, 21.0)).await.unwrap();
        }

        let store = JsonlStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        let next = store.insert(validated(1, 22.0)).await.unwrap();
        assert_eq!(next.id, 3);

        let recent = store.recent(None, 50).await.unwrap();
        assert_eq!(recent[0].id, 3);
        assert_eq!(recent[0].temperature, 22.0);
    }

    #[tokio::test]
    async fn file_holds_one_record_per_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.jsonl");
        let store = JsonlStore::open(&path).unwrap();
        store.insert(validated(5, 19.5)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["deviceId"], "5");
        assert!(value["receivedAt"].is_string());
    }

    #[tokio::test]
    async fn torn_trailing_record_is_truncated_on_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.jsonl");
        {
            let store = JsonlStore::open(&path).unwrap();
            store.insert(validated(1, 20.0)).await.unwrap();
        }
        let intact = std::fs::read(&path).unwrap();
        let mut torn = intact.clone();
        torn.extend_from_slice(br#"{"id":2,"generatedAt":"2024-"#);
        std::fs::write(&path, &torn).unwrap();

        let store = JsonlStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(std::fs::read(&path).unwrap(), intact);

        let next = store.insert(validated(2, 21.0)).await.unwrap();
        assert_eq!(next.id, 2);
        let reopened = JsonlStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
    }

    #[tokio::test]
    async fn failed_append_leaves_no_record_and_spends_the_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.jsonl");
        let store = JsonlStore::open(&path).unwrap();
        store.insert(validated(1, 20.0)).await.unwrap();
        let before = std::fs::read(&path).unwrap();

        let writable = {
            let mut writer = store.writer.lock().await;
            std::mem::replace(&mut writer.file, Arc::new(File::open(&path).unwrap()))
        };
        assert!(matches!(
            store.insert(validated(1, 21.0)).await,
            Err(StoreError::Io(_))
        ));
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(store.len(), 1);

        store.writer.lock().await.file = writable;
        let retried = store.insert(validated(1, 21.0)).await.unwrap();
        assert_eq!(retried.id, 3);

        let reopened = JsonlStore::open(&path).unwrap();
        let ids: Vec<u64> = reopened
            .recent(None, 50)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn corrupt_line_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.jsonl");
        std::fs::write(&path, "{\"id\":1}\nnot json\n").unwrap();
        assert!(matches!(
            JsonlStore::open(&path),
            Err(StoreError::Corrupt { line: 1, .. })
        ));
    }
}
