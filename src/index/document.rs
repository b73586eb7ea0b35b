//! Index document loading
//!
//! The index document is the companion file written next to the data file.
//! It is JSON by default; `.yaml`/`.yml` files are read as YAML.

use std::path::Path;

use serde::Deserialize;

use super::model::{ElementType, StorageFormat};
use crate::utils::{RepoError, Result};

/// Tensor entry of the index document
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TensorDef {
    /// Dimensions, innermost first
    pub dimensions: Vec<u32>,

    /// Element type
    #[serde(rename = "type")]
    pub element_type: ElementType,
}

/// Raw index document as written by the repository writer
///
/// Every field is optional at this level so that a missing field is
/// reported with its name instead of a generic deserializer message.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IndexDocument {
    /// Number of samples in the data file
    pub total_samples: Option<u64>,

    /// Number of tensors in every sample
    pub tensors_per_sample: Option<u32>,

    /// Storage format tag
    pub format: Option<StorageFormat>,

    /// Framerate as "N/D"
    pub framerate: Option<String>,

    /// Per-tensor shapes and types
    pub tensors: Option<Vec<TensorDef>>,

    /// Inline format descriptor (alternative to `tensors`)
    pub caps: Option<String>,

    /// Byte length of every sample (flexible/sparse)
    pub sample_lengths: Option<Vec<u64>>,
}

impl IndexDocument {
    /// Load an index document, picking the syntax from the file extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(RepoError::io(path))?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RepoError::format(format!("invalid index document: {}", e)))
    }

    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RepoError::format(format!("invalid index document: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ErrorKind;

    const STATIC_JSON: &str = r#"{
        "total_samples": 10,
        "tensors_per_sample": 2,
        "format": "static",
        "framerate": "0/1",
        "tensors": [
            {"dimensions": [1, 1, 784, 1], "type": "float32"},
            {"dimensions": [1, 1, 10, 1], "type": "float32"}
        ]
    }"#;

    const SPARSE_YAML: &str = r#"
total_samples: 3
tensors_per_sample: 1
format: sparse
tensors:
  - dimensions: [10]
    type: uint8
sample_lengths: [12, 40, 7]
"#;

    #[test]
    fn test_parse_json_document() {
        let doc = IndexDocument::from_json(STATIC_JSON).unwrap();
        assert_eq!(doc.total_samples, Some(10));
        assert_eq!(doc.tensors_per_sample, Some(2));
        assert_eq!(doc.format, Some(StorageFormat::Static));
        let tensors = doc.tensors.unwrap();
        assert_eq!(tensors.len(), 2);
        assert_eq!(tensors[0].dimensions, vec![1, 1, 784, 1]);
        assert_eq!(tensors[1].element_type, ElementType::Float32);
        assert!(doc.sample_lengths.is_none());
    }

    #[test]
    fn test_parse_yaml_document() {
        let doc = IndexDocument::from_yaml(SPARSE_YAML).unwrap();
        assert_eq!(doc.format, Some(StorageFormat::Sparse));
        assert_eq!(doc.sample_lengths, Some(vec![12, 40, 7]));
    }

    #[test]
    fn test_negative_and_non_numeric_fields() {
        let err = IndexDocument::from_json(r#"{"total_samples": -1}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = IndexDocument::from_json(r#"{"total_samples": "ten"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = IndexDocument::from_json(r#"{"sample_lengths": [1, -2]}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_load_missing_file() {
        let err = IndexDocument::load("/nonexistent/index.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.yaml");
        std::fs::write(&path, SPARSE_YAML).unwrap();
        let doc = IndexDocument::load(&path).unwrap();
        assert_eq!(doc.total_samples, Some(3));

        let path = dir.path().join("mnist.json");
        std::fs::write(&path, STATIC_JSON).unwrap();
        let doc = IndexDocument::load(&path).unwrap();
        assert_eq!(doc.total_samples, Some(10));
    }
}
