/// Filesystem blob store.
///
/// Layout: `<root>/<bucket>/<key>` holds the body and
/// `<root>/<bucket>/<key>.meta.json` holds content type, etag and user
/// metadata. Sidecars never appear in listings.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{content_hash, BlobStore, ObjectMetadata, ObjectSummary};
use crate::model::StorageError;

const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    etag: String,
    #[serde(default)]
    metadata: ObjectMetadata,
}

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads back an object body.
    pub fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        Ok(fs::read(self.object_path(bucket, key)?)?)
    }

    /// Reads back an object's user metadata.
    pub fn metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError> {
        let sidecar = self.read_sidecar(&self.object_path(bucket, key)?)?;
        Ok(sidecar.map(|s| s.metadata).unwrap_or_default())
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        if bucket.is_empty() || bucket.contains(|c: char| c == '/' || c == '\\') || bucket == "." || bucket == ".." {
            return Err(StorageError::InvalidKey(format!("bucket '{}'", bucket)));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.bucket_path(bucket)?.join(key))
    }

    fn read_sidecar(&self, object: &Path) -> Result<Option<Sidecar>, StorageError> {
        let path = sidecar_path(object);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

fn sidecar_path(object: &Path) -> PathBuf {
    let mut name = object.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Keys are relative, `/` separated, and may not escape the bucket.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.ends_with('/')
        || key.ends_with(SIDECAR_SUFFIX)
        || Path::new(key)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Collects every object key under `dir`, relative to `bucket_root`.
fn walk(bucket_root: &Path, dir: &Path, keys: &mut Vec<String>) -> Result<(), StorageError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(bucket_root, &path, keys)?;
            continue;
        }
        let Ok(relative) = path.strip_prefix(bucket_root) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !key.ends_with(SIDECAR_SUFFIX) {
            keys.push(key);
        }
    }
    Ok(())
}

impl BlobStore for LocalBlobStore {
    fn list_by_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>, StorageError> {
        let bucket_root = self.bucket_path(bucket)?;

        // Only the directory part of the prefix can be walked directly.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = if dir_part.is_empty() {
            bucket_root.clone()
        } else {
            validate_key(dir_part)?;
            bucket_root.join(dir_part)
        };
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        walk(&bucket_root, &start, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();

        keys.into_iter()
            .map(|key| {
                let object = bucket_root.join(&key);
                let etag = match self.read_sidecar(&object)? {
                    Some(sidecar) => sidecar.etag,
                    None => content_hash(&fs::read(&object)?),
                };
                Ok(ObjectSummary { key, etag: format!("\"{}\"", etag) })
            })
            .collect()
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let object = self.object_path(bucket, key)?;
        if let Some(parent) = object.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&object, body)?;

        let sidecar = Sidecar {
            content_type: content_type.to_string(),
            etag: content_hash(body),
            metadata: metadata.clone(),
        };
        fs::write(sidecar_path(&object), serde_json::to_vec_pretty(&sidecar)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_put_then_list_returns_quoted_md5_etag() {
        let (_dir, store) = store();
        store
            .put("buoycams", "images/41009/2025/11/18/20251118_161502.jpg", b"abc", "image/jpeg", &ObjectMetadata::new())
            .unwrap();

        let listed = store.list_by_prefix("buoycams", "images/41009/2025/11/18/").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "images/41009/2025/11/18/20251118_161502.jpg");
        assert_eq!(listed[0].etag, "\"900150983cd24fb0d6963f7d28e17f72\"");
    }

    #[test]
    fn test_listing_is_sorted_and_prefix_scoped() {
        let (_dir, store) = store();
        let meta = ObjectMetadata::new();
        for key in [
            "images/41009/2025/11/18/20251118_163000.jpg",
            "images/41009/2025/11/18/20251118_160000.jpg",
            "images/41009/2025/11/17/20251117_235900.jpg",
            "images/42036/2025/11/18/20251118_160000.jpg",
        ] {
            store.put("buoycams", key, key.as_bytes(), "image/jpeg", &meta).unwrap();
        }

        let keys: Vec<_> = store
            .list_by_prefix("buoycams", "images/41009/2025/11/18/")
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(
            keys,
            vec![
                "images/41009/2025/11/18/20251118_160000.jpg",
                "images/41009/2025/11/18/20251118_163000.jpg",
            ]
        );
    }

    #[test]
    fn test_missing_prefix_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.list_by_prefix("buoycams", "images/41009/2025/11/18/").unwrap().is_empty());
    }

    #[test]
    fn test_metadata_round_trips_through_sidecar() {
        let (_dir, store) = store();
        let mut meta = ObjectMetadata::new();
        meta.insert("station_id".to_string(), "41009".to_string());
        store.put("buoycams", "metadata/41009/a.txt", b"log", "text/plain", &meta).unwrap();

        assert_eq!(store.get("buoycams", "metadata/41009/a.txt").unwrap(), b"log");
        assert_eq!(store.metadata("buoycams", "metadata/41009/a.txt").unwrap(), meta);
    }

    #[test]
    fn test_keys_cannot_escape_bucket() {
        let (_dir, store) = store();
        let meta = ObjectMetadata::new();
        for key in ["../escape.jpg", "/abs.jpg", "images/../../x", "", "images/"] {
            assert!(
                matches!(store.put("buoycams", key, b"x", "image/jpeg", &meta), Err(StorageError::InvalidKey(_))),
                "key '{}' should be rejected",
                key
            );
        }
        assert!(store.put("../b", "k.jpg", b"x", "image/jpeg", &meta).is_err());
    }
}
