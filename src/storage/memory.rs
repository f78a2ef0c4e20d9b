//! In-memory storage backend.
//!
//! Stores all objects in nested maps with no persistence.  Useful for
//! tests and ephemeral runs.  Uses `RwLock<BTreeMap>` so that listings come
//! out sorted without extra work.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::backend::{Storage, StorageFuture};
use crate::errors::StorageError;
use crate::object::Object;

type Buckets = BTreeMap<String, BTreeMap<String, Object>>;

/// Keeps every bucket and object in process memory.
#[derive(Default)]
pub struct MemoryStorage {
    buckets: RwLock<Buckets>,
}

impl MemoryStorage {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation is a single insert or remove, so a poisoned map is
    // still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Buckets> {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Buckets> {
        self.buckets.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn create_bucket(&self, name: &str) -> StorageFuture<'_, ()> {
        let name = name.to_string();
        Box::pin(async move {
            if name.is_empty() {
                return Err(StorageError::invalid_argument("bucket name must not be empty"));
            }
            self.write().entry(name).or_default();
            Ok(())
        })
    }

    fn list_buckets(&self) -> StorageFuture<'_, Vec<String>> {
        Box::pin(async move { Ok(self.read().keys().cloned().collect()) })
    }

    fn get_bucket(&self, name: &str) -> StorageFuture<'_, ()> {
        let name = name.to_string();
        Box::pin(async move {
            if self.read().contains_key(&name) {
                Ok(())
            } else {
                Err(StorageError::BucketNotFound { bucket: name })
            }
        })
    }

    fn create_object(&self, object: Object) -> StorageFuture<'_, ()> {
        Box::pin(async move {
            if object.bucket_name.is_empty() {
                return Err(StorageError::invalid_argument("bucket name must not be empty"));
            }
            debug!(
                "memory create_object: bucket={} name={} size={}",
                object.bucket_name,
                object.name,
                object.size()
            );
            let mut buckets = self.write();
            buckets
                .entry(object.bucket_name.clone())
                .or_default()
                .insert(object.name.clone(), object);
            Ok(())
        })
    }

    fn list_objects(&self, bucket: &str) -> StorageFuture<'_, Vec<Object>> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            let objects: Vec<Object> = self
                .read()
                .get(&bucket)
                .map(|objects| objects.values().cloned().collect())
                .unwrap_or_default();
            Ok(objects)
        })
    }

    fn get_object(&self, bucket: &str, name: &str) -> StorageFuture<'_, Object> {
        let bucket = bucket.to_string();
        let name = name.to_string();
        Box::pin(async move {
            let found = self
                .read()
                .get(&bucket)
                .and_then(|objects| objects.get(&name))
                .cloned();
            found.ok_or(StorageError::ObjectNotFound { bucket, name })
        })
    }

    fn delete_object(&self, bucket: &str, name: &str) -> StorageFuture<'_, ()> {
        let bucket = bucket.to_string();
        let name = name.to_string();
        Box::pin(async move {
            if name.is_empty() {
                return Err(StorageError::invalid_argument(
                    "can't delete object with empty name",
                ));
            }
            let removed = self
                .write()
                .get_mut(&bucket)
                .and_then(|objects| objects.remove(&name));
            match removed {
                Some(_) => Ok(()),
                None => Err(StorageError::ObjectNotFound { bucket, name }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_objects_are_independent_copies() {
        let storage = MemoryStorage::new();
        let mut obj = Object::new("b", "k", &b"original"[..]);
        storage.create_object(obj.clone()).await.unwrap();

        obj.content = bytes::Bytes::from_static(b"changed");
        assert_eq!(
            storage.get_object("b", "k").await.unwrap().content.as_ref(),
            b"original"
        );
    }

    #[tokio::test]
    async fn test_prefix_and_leaf_coexist() {
        // No directories here, so names that would clash on disk are fine.
        let storage = MemoryStorage::new();
        storage.create_object(Object::new("b", "a", &b"1"[..])).await.unwrap();
        storage.create_object(Object::new("b", "a/b", &b"2"[..])).await.unwrap();
        assert_eq!(storage.list_objects("b").await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates() {
        let storage = Arc::new(MemoryStorage::new());
        let handles: Vec<_> = (0..100)
            .map(|i| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    storage
                        .create_object(Object::new("b", format!("obj-{i:03}"), vec![i as u8]))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let objects = storage.list_objects("b").await.unwrap();
        assert_eq!(objects.len(), 100);
        assert_eq!(objects[7].name, "obj-007");
        assert_eq!(objects[7].content.as_ref(), &[7u8]);
    }
}
