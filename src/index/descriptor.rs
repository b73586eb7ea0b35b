//! Inline format descriptor parsing
//!
//! A descriptor is a caps-like string describing the tensor layout without
//! an index document:
//!
//! ```text
//! other/tensors, format=static, framerate=0/1, num_tensors=2,
//!     dimensions=1:1:784:1.1:1:10:1, types=float32.float32
//! ```
//!
//! Values may carry a `(type)` annotation (`format=(string)static`) and may
//! be quoted. Dimension groups are separated by `.`, the dims of one tensor
//! by `:`. Types are separated by `.` or `,`.

use std::collections::HashMap;

use super::model::{ElementType, Framerate, StorageFormat, TensorInfo};
use crate::utils::{RepoError, Result};

/// Media types a descriptor may declare
const TENSORS_MEDIA_TYPE: &str = "other/tensors";
const TENSOR_MEDIA_TYPE: &str = "other/tensor";

/// Layout information carried by a descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescriptor {
    pub storage_format: StorageFormat,
    pub framerate: Framerate,
    /// Empty when the format does not declare shapes (flexible/sparse)
    pub tensors: Vec<TensorInfo>,
    /// Declared tensor count (`num_tensors`), if any
    pub num_tensors: Option<u32>,
}

impl FormatDescriptor {
    /// Parse a descriptor string
    pub fn parse(descriptor: &str) -> Result<Self> {
        let tokens = split_top_level(descriptor);
        let mut iter = tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty());

        let media_type = iter
            .next()
            .ok_or_else(|| RepoError::format("empty format descriptor"))?;
        if media_type != TENSORS_MEDIA_TYPE && media_type != TENSOR_MEDIA_TYPE {
            return Err(RepoError::format(format!(
                "unsupported media type '{}' in format descriptor",
                media_type
            )));
        }

        let mut fields: HashMap<String, String> = HashMap::new();
        for token in iter {
            let (key, value) = token.split_once('=').ok_or_else(|| {
                RepoError::format(format!("malformed descriptor field '{}'", token))
            })?;
            fields.insert(key.trim().to_lowercase(), clean_value(value));
        }

        let storage_format = match fields.get("format") {
            Some(f) => f.parse()?,
            None => StorageFormat::Static,
        };

        let framerate = match fields.get("framerate") {
            Some(f) => f.parse()?,
            None => Framerate::default(),
        };

        let num_tensors = match fields.get("num_tensors") {
            Some(n) => Some(n.parse::<u32>().map_err(|_| {
                RepoError::format(format!("invalid num_tensors '{}'", n))
            })?),
            None if media_type == TENSOR_MEDIA_TYPE => Some(1),
            None => None,
        };

        let dims = fields.get("dimensions").or_else(|| fields.get("dimension"));
        let types = fields.get("types").or_else(|| fields.get("type"));

        let tensors = match (dims, types) {
            (Some(dims), Some(types)) => parse_tensors(dims, types)?,
            (None, None) => Vec::new(),
            _ => {
                return Err(RepoError::format(
                    "format descriptor must declare both dimensions and types",
                ))
            }
        };

        if let Some(n) = num_tensors {
            if !tensors.is_empty() && n as usize != tensors.len() {
                return Err(RepoError::format(format!(
                    "num_tensors is {} but {} tensor shapes are declared",
                    n,
                    tensors.len()
                )));
            }
        }

        if storage_format == StorageFormat::Static && tensors.is_empty() {
            return Err(RepoError::format(
                "static format descriptor requires dimensions and types",
            ));
        }

        Ok(Self {
            storage_format,
            framerate,
            tensors,
            num_tensors,
        })
    }

    /// Effective tensor count
    pub fn tensor_count(&self) -> u32 {
        self.num_tensors.unwrap_or(self.tensors.len() as u32)
    }
}

/// Split on commas that are not inside double quotes
fn split_top_level(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => tokens.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    tokens.push(current);
    tokens
}

/// Strip a `(type)` annotation and surrounding quotes
fn clean_value(value: &str) -> String {
    let mut v = value.trim();
    if v.starts_with('(') {
        if let Some(end) = v.find(')') {
            v = v[end + 1..].trim();
        }
    }
    v.trim_matches('"').trim().to_string()
}

fn parse_tensors(dims: &str, types: &str) -> Result<Vec<TensorInfo>> {
    let dim_groups: Vec<Vec<u32>> = dims
        .split('.')
        .map(|group| {
            group
                .split(':')
                .map(|d| {
                    d.trim().parse::<u32>().map_err(|_| {
                        RepoError::format(format!("invalid dimension '{}' in '{}'", d, dims))
                    })
                })
                .collect::<Result<Vec<u32>>>()
        })
        .collect::<Result<_>>()?;

    let element_types: Vec<ElementType> = types
        .split(|c| c == '.' || c == ',')
        .map(|t| t.parse())
        .collect::<Result<_>>()?;

    if dim_groups.len() != element_types.len() {
        return Err(RepoError::format(format!(
            "{} dimension groups but {} types declared",
            dim_groups.len(),
            element_types.len()
        )));
    }

    Ok(dim_groups
        .into_iter()
        .zip(element_types)
        .map(|(dims, ty)| TensorInfo::new(dims, ty))
        .collect())
}
