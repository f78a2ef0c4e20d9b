//! Prometheus metrics for fakestore.
//!
//! Defines metric name constants, installs the global Prometheus recorder
//! (optionally with its own scrape listener), and provides
//! [`InstrumentedStorage`], a [`Storage`] wrapper that counts every
//! operation by outcome.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::errors::Result;
use crate::object::Object;
use crate::storage::backend::{Storage, StorageFuture};

// -- Metric name constants ----------------------------------------------------

/// Total storage operations (counter). Labels: operation, status.
pub const STORAGE_OPERATIONS_TOTAL: &str = "fakestore_storage_operations_total";

/// Total content bytes written through `create_object` (counter).
pub const BYTES_WRITTEN_TOTAL: &str = "fakestore_bytes_written_total";

// -- Recorder installation ----------------------------------------------------

/// Install the global Prometheus recorder.
///
/// With `listen` set, an HTTP scrape endpoint is served on that address
/// (requires a running tokio runtime).
pub fn init_metrics(listen: Option<&str>) -> anyhow::Result<()> {
    let builder = PrometheusBuilder::new();
    match listen {
        Some(addr) => {
            let addr: SocketAddr = addr.parse()?;
            builder.with_http_listener(addr).install()?;
            tracing::info!("Prometheus metrics listening on {}", addr);
        }
        None => {
            builder.install_recorder()?;
        }
    }
    describe_metrics();
    Ok(())
}

/// Register metric descriptions with the global recorder.
pub fn describe_metrics() {
    describe_counter!(STORAGE_OPERATIONS_TOTAL, "Total storage operations by type");
    describe_counter!(BYTES_WRITTEN_TOTAL, "Total object bytes written");
}

/// Count one finished operation and hand its result back unchanged.
pub fn record_operation<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    let status = match &result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    };
    counter!(STORAGE_OPERATIONS_TOTAL, "operation" => operation, "status" => status).increment(1);
    result
}

// -- Instrumented backend -----------------------------------------------------

/// Wraps any backend and records [`STORAGE_OPERATIONS_TOTAL`] per call.
pub struct InstrumentedStorage {
    inner: Arc<dyn Storage>,
}

impl InstrumentedStorage {
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self { inner }
    }
}

impl Storage for InstrumentedStorage {
    fn create_bucket(&self, name: &str) -> StorageFuture<'_, ()> {
        let fut = self.inner.create_bucket(name);
        Box::pin(async move { record_operation("create_bucket", fut.await) })
    }

    fn list_buckets(&self) -> StorageFuture<'_, Vec<String>> {
        let fut = self.inner.list_buckets();
        Box::pin(async move { record_operation("list_buckets", fut.await) })
    }

    fn get_bucket(&self, name: &str) -> StorageFuture<'_, ()> {
        let fut = self.inner.get_bucket(name);
        Box::pin(async move { record_operation("get_bucket", fut.await) })
    }

    fn create_object(&self, object: Object) -> StorageFuture<'_, ()> {
        let size = object.size();
        let fut = self.inner.create_object(object);
        Box::pin(async move {
            let result = record_operation("create_object", fut.await);
            if result.is_ok() {
                counter!(BYTES_WRITTEN_TOTAL).increment(size);
            }
            result
        })
    }

    fn list_objects(&self, bucket: &str) -> StorageFuture<'_, Vec<Object>> {
        let fut = self.inner.list_objects(bucket);
        Box::pin(async move { record_operation("list_objects", fut.await) })
    }

    fn get_object(&self, bucket: &str, name: &str) -> StorageFuture<'_, Object> {
        let fut = self.inner.get_object(bucket, name);
        Box::pin(async move { record_operation("get_object", fut.await) })
    }

    fn delete_object(&self, bucket: &str, name: &str) -> StorageFuture<'_, ()> {
        let fut = self.inner.delete_object(bucket, name);
        Box::pin(async move { record_operation("delete_object", fut.await) })
    }
}
