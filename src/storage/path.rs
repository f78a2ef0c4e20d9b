//! Mapping between logical `(bucket, name)` pairs and physical paths.
//!
//! Each bucket name and each `/`-delimited component of an object name is
//! percent-escaped on its own, so a `/` inside a component can never be
//! confused with a directory boundary.  Decoding is strict: a physical
//! segment is only accepted if re-encoding its decoded form reproduces it
//! exactly, which keeps the mapping one-to-one in both directions.
//!
//! Reserved spellings (never produced by the plain escape):
//!
//! | logical segment | physical segment |
//! |-----------------|------------------|
//! | `""`            | `%`              |
//! | `.`             | `%2E`            |
//! | `..`            | `%2E%2E`         |

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::errors::{Result, StorageError};

/// Characters escaped in every physical segment.  Non-ASCII bytes are
/// always escaped by `utf8_percent_encode`.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'*')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Physical spelling of an empty logical segment.
const EMPTY_SEGMENT: &str = "%";

/// Logical separator inside object names.
pub const SEPARATOR: char = '/';

/// Name of the filesystem backend's scratch directory under the root.
/// Not a canonical encoding of anything, so it never shadows a bucket.
pub const SCRATCH_DIR: &str = "%tmp";

/// Physical location of one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    /// Directory holding the object file (bucket root plus all leading
    /// name components).
    pub dir: PathBuf,
    /// The object file itself.
    pub file: PathBuf,
}

/// Escape a single segment.
pub fn encode_segment(segment: &str) -> String {
    match segment {
        "" => EMPTY_SEGMENT.to_string(),
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => utf8_percent_encode(segment, SEGMENT).to_string(),
    }
}

/// Reverse [`encode_segment`].
///
/// Returns `None` for anything `encode_segment` could not have produced:
/// invalid UTF-8 after unescaping, lower-case hex, unnecessary escapes or
/// stray `%` characters.
pub fn decode_segment(encoded: &str) -> Option<String> {
    if encoded == EMPTY_SEGMENT {
        return Some(String::new());
    }
    let decoded = percent_decode_str(encoded).decode_utf8().ok()?.into_owned();
    (encode_segment(&decoded) == encoded).then_some(decoded)
}

/// Decode a directory entry name, which must be valid UTF-8.
pub fn decode_os_segment(encoded: &OsStr) -> Option<String> {
    decode_segment(encoded.to_str()?)
}

/// Root directory of `bucket` under `root`.
pub fn bucket_path(root: &Path, bucket: &str) -> PathBuf {
    root.join(encode_segment(bucket))
}

/// Physical directory and file for object `name` in `bucket`.
pub fn object_path(root: &Path, bucket: &str, name: &str) -> ObjectPath {
    let mut dir = bucket_path(root, bucket);
    let leaf = match name.rsplit_once(SEPARATOR) {
        Some((parents, leaf)) => {
            for component in parents.split(SEPARATOR) {
                dir.push(encode_segment(component));
            }
            leaf
        }
        None => name,
    };
    let file = dir.join(encode_segment(leaf));
    ObjectPath { dir, file }
}

/// Recover the logical object name of `file`, which must lie below
/// `bucket_root`.
///
/// Works purely from the escaped segments between the two paths; no path
/// cleaning is involved, so names with empty or dot components come back
/// exactly as written.
pub fn decode_object_name(bucket_root: &Path, file: &Path) -> Result<String> {
    let foreign = || StorageError::ForeignEntry {
        path: file.to_path_buf(),
    };
    let relative = file.strip_prefix(bucket_root).map_err(|_| foreign())?;

    let mut segments = Vec::new();
    for component in relative.components() {
        let Component::Normal(raw) = component else {
            return Err(foreign());
        };
        segments.push(decode_os_segment(raw).ok_or_else(foreign)?);
    }
    if segments.is_empty() {
        return Err(foreign());
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: &[&str] = &[
        "file.txt",
        "a/b/c.txt",
        "2023/trip/img1.jpg",
        "",
        "/",
        "//",
        "/leading",
        "trailing/",
        "double//slash",
        ".",
        "..",
        "../../etc/passwd",
        "a/./b",
        "a/../b",
        "...",
        ".hidden",
        "100%",
        "%2F",
        "%",
        "%tmp",
        "with space/and?query#frag",
        "back\\slash",
        "colon:star*pipe|",
        "üñíçødé/日本語",
        "tab\there",
        "MiXeD/case",
    ];

    #[test]
    fn test_segment_roundtrip() {
        for name in NAMES {
            for segment in name.split('/') {
                let encoded = encode_segment(segment);
                assert!(!encoded.is_empty());
                assert!(!encoded.contains('/'), "{encoded:?} contains a separator");
                assert_ne!(encoded, ".");
                assert_ne!(encoded, "..");
                assert_eq!(decode_segment(&encoded).as_deref(), Some(segment));
            }
        }
    }

    #[test]
    fn test_object_name_roundtrip() {
        let root = Path::new("/data");
        for name in NAMES {
            let path = object_path(root, "bucket", name);
            let bucket_root = bucket_path(root, "bucket");
            assert!(path.file.starts_with(&bucket_root));
            assert_eq!(path.file.parent(), Some(path.dir.as_path()));
            assert_eq!(
                decode_object_name(&bucket_root, &path.file).unwrap(),
                *name,
                "name {name:?} did not survive"
            );
        }
    }

    #[test]
    fn test_distinct_names_distinct_paths() {
        let root = Path::new("/data");
        let mut seen = std::collections::HashSet::new();
        for name in NAMES {
            assert!(seen.insert(object_path(root, "b", name).file), "collision on {name:?}");
        }
    }

    #[test]
    fn test_separator_inside_bucket_name() {
        let root = Path::new("/data");
        assert_eq!(bucket_path(root, "a/b"), Path::new("/data/a%2Fb"));
        assert_ne!(
            object_path(root, "a/b", "c").file,
            object_path(root, "a", "b/c").file
        );
    }

    #[test]
    fn test_layout() {
        let path = object_path(Path::new("/data"), "photos", "2023/trip/img 1.jpg");
        assert_eq!(path.dir, Path::new("/data/photos/2023/trip"));
        assert_eq!(path.file, Path::new("/data/photos/2023/trip/img%201.jpg"));
    }

    #[test]
    fn test_traversal_stays_in_bucket() {
        let root = Path::new("/data");
        let path = object_path(root, "..", "../../etc/passwd");
        assert_eq!(
            path.file,
            Path::new("/data/%2E%2E/%2E%2E/%2E%2E/etc/passwd")
        );
        for component in path.file.components() {
            assert_ne!(component, Component::ParentDir);
        }
    }

    #[test]
    fn test_non_canonical_segments_rejected() {
        assert_eq!(decode_segment("a%2f"), None); // lower-case hex
        assert_eq!(decode_segment("%61"), None); // unnecessary escape
        assert_eq!(decode_segment("50%"), None); // stray percent
        assert_eq!(decode_segment("%FF"), None); // invalid UTF-8
        assert_eq!(decode_segment(SCRATCH_DIR), None);
        assert_eq!(decode_segment("%25tmp").as_deref(), Some("%tmp"));
    }

    #[test]
    fn test_decode_rejects_paths_outside_bucket() {
        let bucket_root = Path::new("/data/b");
        assert!(decode_object_name(bucket_root, Path::new("/data/other/x")).is_err());
        assert!(decode_object_name(bucket_root, bucket_root).is_err());
        assert!(decode_object_name(bucket_root, Path::new("/data/b/bad%zz")).is_err());
    }
}
