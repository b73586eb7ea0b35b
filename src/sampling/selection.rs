//! Tensor selection
//!
//! An ordered subset of tensor indices picked out of every sample. The
//! selection string uses the same comma-separated syntax as the
//! `tensors-sequence` option: `"1,0"` emits tensor 1 then tensor 0.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::utils::{RepoError, Result};

/// Ordered tensor indices to emit per sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSelection {
    indices: Vec<u32>,
}

impl TensorSelection {
    /// Select every tensor in declared order
    pub fn identity(count: u32) -> Self {
        Self {
            indices: (0..count).collect(),
        }
    }

    /// Build from explicit indices (not yet validated)
    pub fn from_indices(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    /// Validate against the tensor count of a sample
    ///
    /// Indices must be pairwise distinct and each below `tensors_per_sample`.
    pub fn validate(&self, tensors_per_sample: u32) -> Result<()> {
        if self.indices.is_empty() {
            return Err(RepoError::sequence("tensor selection is empty"));
        }

        let mut seen = HashSet::with_capacity(self.indices.len());
        for &idx in &self.indices {
            if idx >= tensors_per_sample {
                return Err(RepoError::sequence(format!(
                    "tensor index {} out of range (sample has {} tensors)",
                    idx, tensors_per_sample
                )));
            }
            if !seen.insert(idx) {
                return Err(RepoError::sequence(format!(
                    "tensor index {} selected more than once",
                    idx
                )));
            }
        }
        Ok(())
    }

    /// Whether this selects all `count` tensors in declared order
    pub fn is_identity(&self, count: u32) -> bool {
        self.indices.len() == count as usize
            && self.indices.iter().enumerate().all(|(i, &idx)| idx == i as u32)
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Pick the selected items out of a per-tensor list, in selection order
    ///
    /// `None` when an index falls outside `items`.
    pub fn apply<'a, T>(&self, items: &'a [T]) -> Option<Vec<&'a T>> {
        self.indices.iter().map(|&i| items.get(i as usize)).collect()
    }
}

impl FromStr for TensorSelection {
    type Err = RepoError;

    /// Parse "1,0,2"; only syntax is checked here
    fn from_str(s: &str) -> Result<Self> {
        let indices = s
            .split(',')
            .map(|part| {
                let part = part.trim();
                part.parse::<u32>().map_err(|_| {
                    RepoError::sequence(format!("invalid tensor index '{}' in '{}'", part, s))
                })
            })
            .collect::<Result<Vec<u32>>>()?;
        Ok(Self { indices })
    }
}

impl fmt::Display for TensorSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.indices.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ErrorKind;

    #[test]
    fn test_parse_and_display() {
        let sel: TensorSelection = "1, 0,2".parse().unwrap();
        assert_eq!(sel.indices(), &[1, 0, 2]);
        assert_eq!(sel.to_string(), "1,0,2");

        assert_eq!(TensorSelection::identity(2).to_string(), "0,1");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "0,,1", "a,b", "-1", "0;1"] {
            let err = bad.parse::<TensorSelection>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Sequence, "input: {:?}", bad);
        }
    }

    #[test]
    fn test_validate() {
        let sel: TensorSelection = "1,0".parse().unwrap();
        assert!(sel.validate(2).is_ok());

        // Index 2 does not exist in a two-tensor sample
        let sel: TensorSelection = "1,0,2".parse().unwrap();
        assert_eq!(sel.validate(2).unwrap_err().kind(), ErrorKind::Sequence);

        let sel: TensorSelection = "0,1,0".parse().unwrap();
        assert_eq!(sel.validate(3).unwrap_err().kind(), ErrorKind::Sequence);

        let sel = TensorSelection::from_indices(vec![]);
        assert_eq!(sel.validate(3).unwrap_err().kind(), ErrorKind::Sequence);
    }

    #[test]
    fn test_is_identity() {
        assert!(TensorSelection::identity(3).is_identity(3));
        assert!(!TensorSelection::identity(2).is_identity(3));
        assert!(!TensorSelection::from_indices(vec![1, 0]).is_identity(2));
    }

    #[test]
    fn test_apply() {
        let sizes = [10u64, 20, 30];
        let sel = TensorSelection::from_indices(vec![2, 0]);
        assert_eq!(sel.apply(&sizes), Some(vec![&30, &10]));
        assert_eq!(TensorSelection::from_indices(vec![0, 3]).apply(&sizes), None);
    }
}
