/// In-memory stores.
///
/// Used by the test suite and by `buoycam run --dry-run`. Both stores count
/// their writes so callers can assert that a skipped station wrote nothing.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{content_hash, BlobStore, ObjectMetadata, ObjectSummary, RecordStore};
use crate::model::{ObservationRecord, StorageError};

/// An object held by [`MemoryBlobStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub metadata: ObjectMetadata,
}

#[derive(Debug, Default)]
struct BlobState {
    objects: BTreeMap<(String, String), StoredObject>,
    puts: usize,
}

/// Blob store backed by a sorted map.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    state: Mutex<BlobState>,
    fail_listing: bool,
    fail_puts_under: Option<String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose listings always fail, for exercising fail-open paths.
    pub fn with_failing_listing() -> Self {
        Self { fail_listing: true, ..Self::default() }
    }

    /// A store that rejects writes to keys starting with `prefix`.
    pub fn with_failing_puts(prefix: impl Into<String>) -> Self {
        Self { fail_puts_under: Some(prefix.into()), ..Self::default() }
    }

    /// Inserts an object without counting it as a write.
    pub fn seed(&self, bucket: &str, key: &str, body: &[u8]) {
        if let Ok(mut state) = self.state.lock() {
            state.objects.insert(
                (bucket.to_string(), key.to_string()),
                StoredObject {
                    body: body.to_vec(),
                    content_type: "application/octet-stream".to_string(),
                    metadata: ObjectMetadata::new(),
                },
            );
        }
    }

    /// Number of `put` calls served.
    pub fn put_count(&self) -> usize {
        self.state.lock().map(|s| s.puts).unwrap_or(0)
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state
            .lock()
            .ok()?
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// All keys in a bucket, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state
            .lock()
            .map(|s| {
                s.objects
                    .keys()
                    .filter(|(b, _)| b == bucket)
                    .map(|(_, k)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("store lock poisoned".to_string())
}

impl BlobStore for MemoryBlobStore {
    fn list_by_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>, StorageError> {
        if self.fail_listing {
            return Err(StorageError::Unavailable("listing disabled".to_string()));
        }
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state
            .objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, key), object)| ObjectSummary {
                key: key.clone(),
                etag: format!("\"{}\"", content_hash(&object.body)),
            })
            .collect())
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        if self.fail_puts_under.as_deref().is_some_and(|prefix| key.starts_with(prefix)) {
            return Err(StorageError::Unavailable(format!("writes disabled for {}", key)));
        }
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        state.puts += 1;
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.to_vec(),
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordState {
    records: BTreeMap<(String, String), ObservationRecord>,
    writes: usize,
}

/// Record store backed by a map keyed on `(station_id, timestamp)`.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<RecordState>,
    fail_writes: bool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail.
    pub fn with_failing_writes() -> Self {
        Self { fail_writes: true, ..Self::default() }
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().map(|s| s.writes).unwrap_or(0)
    }

    pub fn get(&self, station_id: &str, timestamp: &str) -> Option<ObservationRecord> {
        self.state
            .lock()
            .ok()?
            .records
            .get(&(station_id.to_string(), timestamp.to_string()))
            .cloned()
    }

    /// Stored records ordered by station then timestamp.
    pub fn records(&self) -> Vec<ObservationRecord> {
        self.state
            .lock()
            .map(|s| s.records.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn put_record(&self, record: &ObservationRecord) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Unavailable("record writes disabled".to_string()));
        }
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        state.writes += 1;
        state.records.insert(
            (record.station_id.clone(), record.timestamp.clone()),
            record.clone(),
        );
        Ok(())
    }
}
