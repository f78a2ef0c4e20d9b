//! Filesystem storage backend.
//!
//! Each object is one JSON document on disk.  Bucket names and the
//! `/`-separated components of object names become nested directories via
//! [`super::path`], e.g. `photos` + `2023/trip/img 1.jpg` is stored at
//! `{root}/photos/2023/trip/img%201.jpg`.
//!
//! A single reader/writer lock guards the whole tree.  Mutations hold the
//! write lock from the first directory check to the final rename; reads,
//! including recursive listing, hold the read lock throughout.  Writes go
//! through a scratch file that is fsynced and renamed into place.

use std::fs::{DirBuilder, Metadata, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use super::backend::{Storage, StorageFuture};
use super::path::{
    bucket_path, decode_object_name, decode_os_segment, object_path, ObjectPath, SCRATCH_DIR,
};
use crate::errors::{Result, StorageError};
use crate::object::Object;

/// Mode for every directory the backend creates (owner only).
const DIR_MODE: u32 = 0o700;

/// Mode for object files (world-readable, owner-writable).
const FILE_MODE: u32 = 0o664;

/// Stores buckets and objects under a root directory.
pub struct FsStorage {
    /// Root directory; one subdirectory per bucket.
    root: PathBuf,
    /// Guards the whole tree below `root`.
    lock: RwLock<()>,
}

impl FsStorage {
    /// Open a backend rooted at `root`, creating the directory if needed.
    ///
    /// Leftover scratch files from an interrupted write are discarded.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        create_dir_all(&root)?;

        let scratch = root.join(SCRATCH_DIR);
        if scratch.is_dir() {
            std::fs::remove_dir_all(&scratch)?;
        }
        create_dir_all(&scratch)?;

        info!("Filesystem storage opened at {}", root.display());
        Ok(Self {
            root,
            lock: RwLock::new(()),
        })
    }

    /// Root directory of this backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // Poisoning is ignored: the lock guards files, not in-memory state.
    fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Operations (caller holds the lock) ─────────────────────────

    fn create_bucket_locked(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(StorageError::invalid_argument("bucket name must not be empty"));
        }
        create_dir_all(&bucket_path(&self.root, name))?;
        Ok(())
    }

    fn list_buckets_locked(&self) -> Result<Vec<String>> {
        let mut buckets = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() || entry.file_name() == SCRATCH_DIR {
                continue;
            }
            let name = decode_os_segment(&entry.file_name())
                .ok_or_else(|| StorageError::ForeignEntry { path: entry.path() })?;
            buckets.push(name);
        }
        buckets.sort();
        Ok(buckets)
    }

    fn get_bucket_locked(&self, name: &str) -> Result<()> {
        match std::fs::metadata(bucket_path(&self.root, name)) {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(StorageError::BucketNotFound {
                bucket: name.to_string(),
            }),
        }
    }

    fn create_object_locked(&self, object: &Object) -> Result<()> {
        self.create_bucket_locked(&object.bucket_name)?;

        let path = object_path(&self.root, &object.bucket_name, &object.name);
        self.check_prefix_conflict(object, &path)?;
        create_dir_all(&path.dir)?;

        let encoded = serde_json::to_vec(object).map_err(|source| StorageError::Encoding {
            path: path.file.clone(),
            source,
        })?;
        self.write_atomic(&path.file, &encoded)
    }

    /// Reject names whose file would have to be a directory, or whose
    /// directories would have to be files, because of an existing object.
    ///
    /// A directory left empty by earlier deletes is not a conflict; it is
    /// removed so the object can take its place.
    fn check_prefix_conflict(&self, object: &Object, path: &ObjectPath) -> Result<()> {
        if stat(&path.file)?.is_some_and(|meta| meta.is_dir()) {
            if holds_entries(&path.file)? {
                return Err(StorageError::invalid_argument(format!(
                    "object name '{}' is already used as a prefix in bucket '{}'",
                    object.name, object.bucket_name
                )));
            }
            debug!("fs removing stale directory {}", path.file.display());
            remove_empty_tree(&path.file)?;
        }

        let bucket_root = bucket_path(&self.root, &object.bucket_name);
        for dir in path.dir.ancestors().take_while(|dir| *dir != bucket_root) {
            if stat(dir)?.is_some_and(|meta| !meta.is_dir()) {
                let prefix = decode_object_name(&bucket_root, dir)?;
                return Err(StorageError::invalid_argument(format!(
                    "object name '{}' conflicts with existing object '{}' in bucket '{}'",
                    object.name, prefix, object.bucket_name
                )));
            }
        }
        Ok(())
    }

    /// Write `data` to a scratch file, fsync, then rename over `target`.
    fn write_atomic(&self, target: &Path, data: &[u8]) -> Result<()> {
        let scratch = self.root.join(SCRATCH_DIR);
        create_dir_all(&scratch)?;
        let tmp_path = scratch.join(format!("tmp-{}", uuid::Uuid::new_v4()));

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(FILE_MODE);
        }

        let written = options.open(&tmp_path).and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| std::fs::rename(&tmp_path, target)) {
            // Best-effort cleanup; the original error is returned.
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn get_object_locked(&self, bucket: &str, name: &str) -> Result<Object> {
        let path = object_path(&self.root, bucket, name).file;
        if !stat(&path)?.is_some_and(|meta| meta.is_file()) {
            return Err(StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            });
        }

        let encoded = std::fs::read(&path)?;
        let mut object: Object = serde_json::from_slice(&encoded)
            .map_err(|source| StorageError::Encoding { path, source })?;
        // The location is authoritative, not the stored copy.
        object.bucket_name = bucket.to_string();
        object.name = name.to_string();
        Ok(object)
    }

    fn list_objects_locked(&self, bucket: &str) -> Result<Vec<Object>> {
        let bucket_root = bucket_path(&self.root, bucket);
        if !stat(&bucket_root)?.is_some_and(|meta| meta.is_dir()) {
            return Ok(Vec::new());
        }

        let mut objects = Vec::new();
        self.collect_objects(bucket, &bucket_root, &bucket_root, &mut objects)?;
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    fn collect_objects(
        &self,
        bucket: &str,
        bucket_root: &Path,
        dir: &Path,
        objects: &mut Vec<Object>,
    ) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect_objects(bucket, bucket_root, &path, objects)?;
                continue;
            }
            let name = decode_object_name(bucket_root, &path)?;
            objects.push(self.get_object_locked(bucket, &name)?);
        }
        Ok(())
    }

    fn delete_object_locked(&self, bucket: &str, name: &str) -> Result<()> {
        let path = object_path(&self.root, bucket, name).file;
        if !stat(&path)?.is_some_and(|meta| meta.is_file()) {
            return Err(StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            });
        }
        // Parent directories are left behind even if now empty.
        std::fs::remove_file(&path)?;
        Ok(())
    }
}

/// `stat` that reports a missing path as `None`.  Any other failure, such
/// as a permission error, is returned.
fn stat(path: &Path) -> io::Result<Option<Metadata>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Whether anything other than directories lives under `dir`.
fn holds_entries(dir: &Path) -> io::Result<bool> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() || holds_entries(&entry.path())? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Remove a tree made only of directories, deepest first.
fn remove_empty_tree(dir: &Path) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        remove_empty_tree(&entry?.path())?;
    }
    std::fs::remove_dir(dir)
}

fn create_dir_all(path: &Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(path)
}

impl Storage for FsStorage {
    fn create_bucket(&self, name: &str) -> StorageFuture<'_, ()> {
        let name = name.to_string();
        Box::pin(async move {
            debug!("fs create_bucket: bucket={}", name);
            let _guard = self.write_guard();
            self.create_bucket_locked(&name)
        })
    }

    fn list_buckets(&self) -> StorageFuture<'_, Vec<String>> {
        Box::pin(async move {
            let _guard = self.read_guard();
            self.list_buckets_locked()
        })
    }

    fn get_bucket(&self, name: &str) -> StorageFuture<'_, ()> {
        let name = name.to_string();
        Box::pin(async move {
            let _guard = self.read_guard();
            self.get_bucket_locked(&name)
        })
    }

    fn create_object(&self, object: Object) -> StorageFuture<'_, ()> {
        Box::pin(async move {
            debug!(
                "fs create_object: bucket={} name={} size={}",
                object.bucket_name,
                object.name,
                object.size()
            );
            let _guard = self.write_guard();
            self.create_object_locked(&object)
        })
    }

    fn list_objects(&self, bucket: &str) -> StorageFuture<'_, Vec<Object>> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            let _guard = self.read_guard();
            let objects = self.list_objects_locked(&bucket)?;
            debug!("fs list_objects: bucket={} count={}", bucket, objects.len());
            Ok(objects)
        })
    }

    fn get_object(&self, bucket: &str, name: &str) -> StorageFuture<'_, Object> {
        let bucket = bucket.to_string();
        let name = name.to_string();
        Box::pin(async move {
            let _guard = self.read_guard();
            self.get_object_locked(&bucket, &name)
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
            debug!("fs delete_object: bucket={} name={}", bucket, name);
            let _guard = self.write_guard();
            self.delete_object_locked(&bucket, &name)
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────
