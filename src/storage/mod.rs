//! Bucket and object storage backends.
//!
//! The [`backend::Storage`] trait is the only way request adapters reach
//! persisted state.  Implementations are the on-disk [`fs::FsStorage`],
//! which maps names onto a directory tree through [`path`], and the
//! ephemeral [`memory::MemoryStorage`].

pub mod backend;
pub mod fs;
pub mod memory;
pub mod path;

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::config::StorageConfig;
use crate::object::Object;
use backend::Storage;

/// Build the backend selected by `config.backend`.
pub fn open_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend.as_str() {
        "filesystem" | "fs" => {
            let root = &config.filesystem.root_dir;
            let backend = fs::FsStorage::new(root)
                .with_context(|| format!("failed to open storage root {root}"))?;
            Arc::new(backend)
        }
        "memory" => {
            info!("Memory storage backend initialized");
            Arc::new(memory::MemoryStorage::new())
        }
        other => anyhow::bail!("unknown storage backend '{other}' (expected filesystem or memory)"),
    };
    Ok(storage)
}

/// Store every object in `objects`, returning how many were written.
///
/// Stops at the first failure.
pub async fn seed(storage: &dyn Storage, objects: Vec<Object>) -> anyhow::Result<usize> {
    let count = objects.len();
    for object in objects {
        let location = format!("{}/{}", object.bucket_name, object.name);
        storage
            .create_object(object)
            .await
            .with_context(|| format!("failed to seed object {location}"))?;
    }
    info!("Seeded {} object(s)", count);
    Ok(count)
}

// ── Tests ───────────────────────────────────────────────────────────
