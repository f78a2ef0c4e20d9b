//! Initial object loading from a mounted directory tree.
//!
//! The first level of folders under the seed directory are buckets; every
//! file below a bucket, at any depth, becomes one object whose name is its
//! `/`-joined relative path.  File and folder names are percent-unescaped
//! when they are valid escapes and used verbatim otherwise.
//!
//! Loading happens once at startup, so failures are reported with context
//! and left to the caller to treat as fatal.

use anyhow::Context;
use percent_encoding::percent_decode_str;
use std::ffi::OsStr;
use std::fs::DirEntry;
use std::path::Path;
use tracing::{debug, info};

use crate::object::Object;

/// Produce one [`Object`] per file found under `seed_dir`.
///
/// A missing `seed_dir` means nothing is mounted and yields no objects.
/// Regular files directly under `seed_dir` belong to no bucket and are
/// skipped.
pub fn load_objects(seed_dir: &Path) -> anyhow::Result<Vec<Object>> {
    if !seed_dir.exists() {
        debug!("Seed directory {} not present, nothing to load", seed_dir.display());
        return Ok(Vec::new());
    }

    let mut objects = Vec::new();
    for entry in sorted_entries(seed_dir)? {
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let bucket = unescape(&entry.file_name());
        let before = objects.len();
        collect_files(&bucket, &entry.path(), "", &mut objects)?;
        info!(
            "Found bucket `{}`, loaded {} file(s)",
            bucket,
            objects.len() - before
        );
    }
    Ok(objects)
}

fn collect_files(
    bucket: &str,
    dir: &Path,
    prefix: &str,
    objects: &mut Vec<Object>,
) -> anyhow::Result<()> {
    for entry in sorted_entries(dir)? {
        let segment = unescape(&entry.file_name());
        let name = if prefix.is_empty() {
            segment
        } else {
            format!("{prefix}/{segment}")
        };

        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(bucket, &path, &name, objects)?;
            continue;
        }

        let content = std::fs::read(&path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        objects.push(Object::new(bucket, name, content));
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> anyhow::Result<Vec<DirEntry>> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read seed directory {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

fn unescape(raw: &OsStr) -> String {
    let raw = raw.to_string_lossy();
    match percent_decode_str(&raw).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::Storage;
    use crate::storage::memory::MemoryStorage;

    fn write(path: &Path, content: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_seed_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let objects = load_objects(&dir.path().join("not-mounted")).unwrap();
        assert!(objects.is_empty());
    }

    #[test]
    fn test_loads_nested_tree() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("photos/2023/trip/img1.jpg"), b"jpeg");
        write(&dir.path().join("photos/readme.txt"), b"hello");
        write(&dir.path().join("docs/empty"), b"");
        write(&dir.path().join("top-level.txt"), b"ignored");

        let objects = load_objects(dir.path()).unwrap();
        let summary: Vec<(&str, &str, &[u8])> = objects
            .iter()
            .map(|o| (o.bucket_name.as_str(), o.name.as_str(), o.content.as_ref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("docs", "empty", &b""[..]),
                ("photos", "2023/trip/img1.jpg", &b"jpeg"[..]),
                ("photos", "readme.txt", &b"hello"[..]),
            ]
        );
    }

    #[test]
    fn test_unescapes_names() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("my%20bucket/a%2Fb.txt"), b"x");
        write(&dir.path().join("raw/100%"), b"y");

        let objects = load_objects(dir.path()).unwrap();
        assert_eq!(objects[0].bucket_name, "my bucket");
        assert_eq!(objects[0].name, "a/b.txt");
        // Not a valid escape: kept as is.
        assert_eq!(objects[1].bucket_name, "raw");
        assert_eq!(objects[1].name, "100%");
    }

    #[tokio::test]
    async fn test_seeding_a_backend() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("b/one"), b"1");
        write(&dir.path().join("b/sub/two"), b"2");

        let storage = MemoryStorage::new();
        let count = crate::storage::seed(&storage, load_objects(dir.path()).unwrap())
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(storage.list_buckets().await.unwrap(), vec!["b".to_string()]);
        let obj = storage.get_object("b", "sub/two").await.unwrap();
        assert_eq!(obj.content.as_ref(), b"2");
    }
}
