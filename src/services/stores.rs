//! File and in-process implementations of the processed-event store and
//! session memory persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::services::traits::{MemoryPersistence, ProcessedEventStore};

/// Non-durable store; processed state is lost on restart
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    seen: Mutex<HashSet<String>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }
}

#[async_trait]
impl ProcessedEventStore for MemoryEventStore {
    async fn has(&self, event_id: &str) -> Result<bool, StoreError> {
        Ok(self.seen.lock().await.contains(event_id))
    }

    async fn mark(&self, event_id: &str) -> Result<(), StoreError> {
        self.seen.lock().await.insert(event_id.to_string());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EventFile {
    #[serde(default)]
    events: Vec<EventRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    event_id: String,
    processed_at: DateTime<Utc>,
}

/// Processed-event store kept in a JSON file.
///
/// The whole set is rewritten on every `mark`, through a temporary file and a
/// rename so a crash never leaves a truncated file behind.
#[derive(Debug)]
pub struct JsonEventStore {
    path: PathBuf,
    events: Mutex<BTreeMap<String, DateTime<Utc>>>,
}

impl JsonEventStore {
    /// Open the store, creating an empty one if the file does not exist.
    ///
    /// A file that exists but cannot be parsed is an error rather than an
    /// empty set, since that would re-process every event.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let events = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let file: EventFile = serde_json::from_slice(&bytes)?;
                file.events
                    .into_iter()
                    .map(|r| (r.event_id, r.processed_at))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            "Loaded {} processed events from {}",
            events.len(),
            path.display()
        );

        Ok(Self {
            path,
            events: Mutex::new(events),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn processed_at(&self, event_id: &str) -> Option<DateTime<Utc>> {
        self.events.lock().await.get(event_id).copied()
    }

    async fn persist(&self, events: &BTreeMap<String, DateTime<Utc>>) -> Result<(), StoreError> {
        let file = EventFile {
            events: events
                .iter()
                .map(|(id, at)| EventRecord {
                    event_id: id.clone(),
                    processed_at: *at,
                })
                .collect(),
        };
        write_atomically(&self.path, &serde_json::to_vec_pretty(&file)?).await
    }
}

#[async_trait]
impl ProcessedEventStore for JsonEventStore {
    async fn has(&self, event_id: &str) -> Result<bool, StoreError> {
        Ok(self.events.lock().await.contains_key(event_id))
    }

    async fn mark(&self, event_id: &str) -> Result<(), StoreError> {
        let mut events = self.events.lock().await;
        if events.contains_key(event_id) {
            return Ok(());
        }

        events.insert(event_id.to_string(), Utc::now());
        if let Err(e) = self.persist(&events).await {
            events.remove(event_id);
            return Err(e);
        }

        tracing::debug!("Marked event processed: {}", event_id);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Ok(tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MemoryFile {
    #[serde(default)]
    recent: Vec<String>,
}

/// Session memory window persisted as `{"recent": [...]}`
pub struct JsonMemoryFile {
    path: PathBuf,
}

impl JsonMemoryFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl MemoryPersistence for JsonMemoryFile {
    async fn load(&self) -> Result<Vec<String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice::<MemoryFile>(&bytes)?.recent),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, entries: &[String]) -> Result<(), StoreError> {
        let file = MemoryFile {
            recent: entries.to_vec(),
        };
        write_atomically(&self.path, &serde_json::to_vec_pretty(&file)?).await
    }
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok, block_on};

    #[test]
    fn test_memory_store_marks() {
        let store = MemoryEventStore::new();
        block_on(async {
            assert!(!assert_ok!(store.has("a").await));
            assert_ok!(store.mark("a").await);
            assert_ok!(store.mark("a").await);
            assert!(assert_ok!(store.has("a").await));
            assert_eq!(store.len().await, 1);
        });
    }

    #[tokio::test]
    async fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("processed.json");

        let store = assert_ok!(JsonEventStore::open(&path).await);
        assert!(!store.health_check().await.unwrap());
        assert_ok!(store.mark("evt-1").await);
        let first_mark = store.processed_at("evt-1").await.unwrap();
        assert_ok!(store.mark("evt-1").await);
        assert_eq!(store.processed_at("evt-1").await, Some(first_mark));
        drop(store);

        let reopened = JsonEventStore::open(&path).await.unwrap();
        assert!(reopened.has("evt-1").await.unwrap());
        assert!(!reopened.has("evt-2").await.unwrap());
        assert!(reopened.health_check().await.unwrap());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"eventId\": \"evt-1\""));
        assert!(raw.contains("processedAt"));
    }

    #[tokio::test]
    async fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = assert_err!(JsonEventStore::open(&path).await);
        assert!(matches!(err, StoreError::SerializationError(_)));
    }

    #[tokio::test]
    async fn test_memory_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonMemoryFile::new(dir.path().join("memory.json"));

        assert!(file.load().await.unwrap().is_empty());
        file.save(&["thai".to_string(), "poke".to_string()]).await.unwrap();
        assert_eq!(file.load().await.unwrap(), vec!["thai", "poke"]);
    }
}
