//! In-memory index model
//!
//! `IndexMetadata` is the single canonical description of a repository,
//! whichever source it was parsed from (index document or inline
//! descriptor). It is immutable once built.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::utils::{RepoError, Result};

/// Tensor element type
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Int8,
    #[serde(alias = "u8")]
    Uint8,
    Int16,
    #[serde(alias = "u16")]
    Uint16,
    Int32,
    #[serde(alias = "u32")]
    Uint32,
    Int64,
    #[serde(alias = "u64")]
    Uint64,
    Float16,
    Float32,
    Float64,
}

impl ElementType {
    /// Get element size in bytes
    pub fn element_size(&self) -> usize {
        match self {
            ElementType::Int8 | ElementType::Uint8 => 1,
            ElementType::Int16 | ElementType::Uint16 | ElementType::Float16 => 2,
            ElementType::Int32 | ElementType::Uint32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::Uint64 | ElementType::Float64 => 8,
        }
    }

    /// Get string representation for display
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Int8 => "int8",
            ElementType::Uint8 => "uint8",
            ElementType::Int16 => "int16",
            ElementType::Uint16 => "uint16",
            ElementType::Int32 => "int32",
            ElementType::Uint32 => "uint32",
            ElementType::Int64 => "int64",
            ElementType::Uint64 => "uint64",
            ElementType::Float16 => "float16",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
        }
    }
}

impl FromStr for ElementType {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        let ty = match s.trim().to_lowercase().as_str() {
            "int8" => ElementType::Int8,
            "uint8" | "u8" => ElementType::Uint8,
            "int16" => ElementType::Int16,
            "uint16" | "u16" => ElementType::Uint16,
            "int32" => ElementType::Int32,
            "uint32" | "u32" => ElementType::Uint32,
            "int64" => ElementType::Int64,
            "uint64" | "u64" => ElementType::Uint64,
            "float16" => ElementType::Float16,
            "float32" => ElementType::Float32,
            "float64" => ElementType::Float64,
            other => return Err(RepoError::format(format!("unknown tensor type '{}'", other))),
        };
        Ok(ty)
    }
}

/// On-disk storage format of the samples
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// Every sample has the same size, derived from the tensor shapes
    #[default]
    Static,
    /// Variable-size samples, each tensor length-prefixed inline
    Flexible,
    /// Opaque externally-encoded blobs
    Sparse,
}

impl StorageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageFormat::Static => "static",
            StorageFormat::Flexible => "flexible",
            StorageFormat::Sparse => "sparse",
        }
    }

    /// Whether samples of this format need an explicit per-sample length array
    pub fn needs_sample_lengths(&self) -> bool {
        !matches!(self, StorageFormat::Static)
    }
}

impl FromStr for StorageFormat {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(StorageFormat::Static),
            "flexible" => Ok(StorageFormat::Flexible),
            "sparse" => Ok(StorageFormat::Sparse),
            other => Err(RepoError::format(format!(
                "unknown storage format '{}'",
                other
            ))),
        }
    }
}

/// Stream framerate as a rational number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framerate {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for Framerate {
    fn default() -> Self {
        Self {
            numerator: 0,
            denominator: 1,
        }
    }
}

impl FromStr for Framerate {
    type Err = RepoError;

    /// Parse "N/D" (a bare "N" means "N/1")
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (num, den) = match s.split_once('/') {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (s, "1"),
        };
        let numerator = num
            .parse::<u32>()
            .map_err(|_| RepoError::format(format!("invalid framerate '{}'", s)))?;
        let denominator = den
            .parse::<u32>()
            .map_err(|_| RepoError::format(format!("invalid framerate '{}'", s)))?;
        if denominator == 0 {
            return Err(RepoError::format(format!(
                "framerate '{}' has a zero denominator",
                s
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Shape and element type of one tensor in a sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    /// Dimensions, innermost first
    pub dims: Vec<u32>,
    pub element_type: ElementType,
}

impl TensorInfo {
    pub fn new(dims: Vec<u32>, element_type: ElementType) -> Self {
        Self { dims, element_type }
    }

    /// Number of elements, `None` on overflow
    pub fn element_count(&self) -> Option<u64> {
        self.dims
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d as u64))
    }

    /// Byte size of this tensor, `None` on overflow
    pub fn byte_size(&self) -> Option<u64> {
        self.element_count()?
            .checked_mul(self.element_type.element_size() as u64)
    }

    /// Render dims the descriptor way ("1:1:784:1")
    pub fn dims_string(&self) -> String {
        self.dims
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Parsed repository index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMetadata {
    pub total_samples: u64,
    pub tensors_per_sample: u32,
    pub tensors: Vec<TensorInfo>,
    pub storage_format: StorageFormat,
    pub framerate: Framerate,
}

impl IndexMetadata {
    /// Check the structural invariants of the model
    ///
    /// Flexible and sparse layouts may leave the shapes undeclared; the
    /// tensor count then stands on its own.
    pub fn validate(&self) -> Result<()> {
        let shapes_required = self.storage_format == StorageFormat::Static;
        if (shapes_required || !self.tensors.is_empty())
            && self.tensors_per_sample as usize != self.tensors.len()
        {
            return Err(RepoError::format(format!(
                "tensors_per_sample is {} but {} tensor shapes are declared",
                self.tensors_per_sample,
                self.tensors.len()
            )));
        }
        if self.tensors_per_sample == 0 {
            return Err(RepoError::format("a sample must contain at least one tensor"));
        }
        if self.storage_format == StorageFormat::Static {
            for (idx, tensor) in self.tensors.iter().enumerate() {
                match tensor.byte_size() {
                    Some(size) if size > 0 => {}
                    Some(_) => {
                        return Err(RepoError::format(format!(
                            "static tensor {} has zero byte size",
                            idx
                        )))
                    }
                    None => {
                        return Err(RepoError::format(format!(
                            "static tensor {} byte size overflows",
                            idx
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    /// Per-tensor byte sizes (static layouts only yield meaningful values)
    pub fn tensor_sizes(&self) -> Vec<u64> {
        self.tensors
            .iter()
            .map(|t| t.byte_size().unwrap_or(0))
            .collect()
    }

    /// Sum of the tensor sizes of one sample, `None` on overflow
    pub fn sample_byte_size(&self) -> Option<u64> {
        self.tensors
            .iter()
            .try_fold(0u64, |acc, t| acc.checked_add(t.byte_size()?))
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let types: Vec<&str> = self.tensors.iter().map(|t| t.element_type.as_str()).collect();
        let dims: Vec<String> = self.tensors.iter().map(|t| t.dims_string()).collect();
        format!(
            "Index: {} samples, {} tensors/sample, format={}, framerate={}, dims={}, types={}",
            self.total_samples,
            self.tensors_per_sample,
            self.storage_format.as_str(),
            self.framerate,
            dims.join("."),
            types.join(",")
        )
    }
}
