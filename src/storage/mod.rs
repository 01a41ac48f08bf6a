/// Persistence seams: the blob store that archives images and logs, and the
/// record store that holds observation rows.
///
/// Submodules:
/// - `local`: filesystem blob store.
/// - `postgres`: PostgreSQL record store.
/// - `memory`: in-memory stores for tests and dry runs.

pub mod local;
pub mod memory;
pub mod postgres;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::{ObservationRecord, StorageError};

/// User metadata attached to a stored object.
pub type ObjectMetadata = BTreeMap<String, String>;

/// One entry of a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    /// Content hash of the object, possibly wrapped in double quotes.
    pub etag: String,
}

/// Object storage organised as buckets of string keys.
pub trait BlobStore {
    /// Lists every object in `bucket` whose key starts with `prefix`.
    fn list_by_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>, StorageError>;

    /// Writes an object, replacing any existing one under the same key.
    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError>;
}

/// Keyed store of observation records.
pub trait RecordStore {
    /// Upserts a record keyed by `(station_id, timestamp)`.
    fn put_record(&self, record: &ObservationRecord) -> Result<(), StorageError>;
}

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn list_by_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>, StorageError> {
        (**self).list_by_prefix(bucket, prefix)
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        (**self).put(bucket, key, body, content_type, metadata)
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn put_record(&self, record: &ObservationRecord) -> Result<(), StorageError> {
        (**self).put_record(record)
    }
}

/// Hex MD5 of a body, the etag format used by every blob store here.
pub fn content_hash(body: &[u8]) -> String {
    format!("{:x}", md5::compute(body))
}
