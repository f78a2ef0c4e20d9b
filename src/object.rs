//! The stored object value type.
//!
//! An [`Object`] is plain data: the owning bucket, the logical name, the raw
//! content bytes and a little descriptive metadata.  Backends persist and
//! return it; nothing here talks to storage.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stored blob.
///
/// `(bucket_name, name)` identifies the object within a backend.  The JSON
/// form uses `bucket`, `name`, `content` (standard base64), `contentType` and
/// `metadata`, which is also the on-disk document of the filesystem backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    /// Owning bucket.
    #[serde(rename = "bucket", default)]
    pub bucket_name: String,

    /// Logical object name; may contain `/`.
    #[serde(default)]
    pub name: String,

    /// Raw content bytes, zero length allowed.
    #[serde(with = "base64_bytes", default)]
    pub content: Bytes,

    /// Optional MIME type supplied by the writer.
    #[serde(
        rename = "contentType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<String>,

    /// Free-form user metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Object {
    /// Create an object with no content type and empty metadata.
    pub fn new(
        bucket_name: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            name: name.into(),
            content: content.into(),
            content_type: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Builder-style setter for the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Builder-style setter for one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Content length in bytes.
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Serde adapter encoding byte content as a standard base64 string.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(content: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(content))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_field_names() {
        let obj = Object::new("photos", "2023/img.jpg", &b"hi"[..]).with_content_type("image/jpeg");
        let value = serde_json::to_value(&obj).unwrap();
        assert_eq!(value["bucket"], "photos");
        assert_eq!(value["name"], "2023/img.jpg");
        assert_eq!(value["content"], "aGk=");
        assert_eq!(value["contentType"], "image/jpeg");
        // Empty metadata is omitted.
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn test_decode_minimal_document() {
        // Documents written without the optional fields still decode.
        let obj: Object =
            serde_json::from_str(r#"{"bucket":"b","name":"n","content":""}"#).unwrap();
        assert_eq!(obj, Object::new("b", "n", Bytes::new()));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let result: Result<Object, _> =
            serde_json::from_str(r#"{"bucket":"b","name":"n","content":"***"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_binary_content_preserved() {
        let content: Vec<u8> = (0u8..=255).collect();
        let obj = Object::new("b", "bin", content.clone()).with_metadata("owner", "me");
        let encoded = serde_json::to_vec(&obj).unwrap();
        let decoded: Object = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded.content.as_ref(), content.as_slice());
        assert_eq!(decoded.metadata.get("owner").map(String::as_str), Some("me"));
        assert_eq!(decoded.size(), 256);
    }
}
