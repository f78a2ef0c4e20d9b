//! Abstract storage trait.
//!
//! Every backend must implement [`Storage`].  These seven operations are
//! the whole boundary between request adapters and persisted state;
//! adapters contain no storage logic of their own.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::object::Object;

/// Boxed future returned by every [`Storage`] method.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Bucket and object storage contract.
///
/// Implementations serialize operations on one instance: mutations are
/// exclusive, reads may run together.  The returned futures only ever
/// block on the backend's own lock; they carry no timeout.
pub trait Storage: Send + Sync + 'static {
    /// Ensure `name` exists.  Succeeds if it already does.
    fn create_bucket(&self, name: &str) -> StorageFuture<'_, ()>;

    /// Names of every known bucket, sorted.
    fn list_buckets(&self) -> StorageFuture<'_, Vec<String>>;

    /// Succeeds iff the bucket exists; `BucketNotFound` otherwise.
    fn get_bucket(&self, name: &str) -> StorageFuture<'_, ()>;

    /// Store `object`, replacing any previous object with the same
    /// bucket and name.  The owning bucket is created if absent.
    fn create_object(&self, object: Object) -> StorageFuture<'_, ()>;

    /// Every object currently stored in `bucket`, sorted by name.
    ///
    /// A bucket that does not exist lists as empty.
    fn list_objects(&self, bucket: &str) -> StorageFuture<'_, Vec<Object>>;

    /// Fetch one object; `ObjectNotFound` if the pair does not exist.
    fn get_object(&self, bucket: &str, name: &str) -> StorageFuture<'_, Object>;

    /// Remove one object.
    ///
    /// An empty `name` is rejected with `InvalidArgument` before storage is
    /// touched; a missing pair yields `ObjectNotFound`.
    fn delete_object(&self, bucket: &str, name: &str) -> StorageFuture<'_, ()>;
}
