//! Sample iteration over a configured range
//!
//! Produces global sample indices for a bounded session: every index of
//! `[start, stop]` exactly once per epoch, for `epoch_count` epochs. With
//! shuffling enabled each epoch draws a fresh uniform permutation;
//! otherwise indices come in ascending order.

use tracing::{debug, info};

use crate::utils::{RepoError, Result};

/// Inclusive sample index range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRange {
    pub start: u64,
    pub stop: u64,
}

impl SampleRange {
    /// Build a range checked against the repository size
    pub fn new(start: u64, stop: u64, total_samples: u64) -> Result<Self> {
        if start >= total_samples {
            return Err(RepoError::SampleOutOfRange {
                index: start,
                total: total_samples,
            });
        }
        if stop >= total_samples {
            return Err(RepoError::SampleOutOfRange {
                index: stop,
                total: total_samples,
            });
        }
        if start > stop {
            return Err(RepoError::InvalidRange { start, stop });
        }
        Ok(Self { start, stop })
    }

    /// Number of samples in the range
    #[inline]
    pub fn len(&self) -> u64 {
        self.stop - self.start + 1
    }

    /// A range always holds at least one sample
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn contains(&self, index: u64) -> bool {
        (self.start..=self.stop).contains(&index)
    }
}

/// One produced sample index and the epoch it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    pub index: u64,
    pub epoch: u32,
}

/// Iterator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationPhase {
    Active,
    Exhausted,
}

/// Stateful cursor over the configured range
///
/// Created when a session becomes active and dropped when it closes.
pub struct SampleIterator {
    range: SampleRange,
    epoch_count: u32,
    epochs_done: u32,
    shuffle: bool,
    /// Current epoch order (shuffle only)
    permutation: Option<Vec<u64>>,
    /// Position within the current epoch
    cursor: usize,
    rng: fastrand::Rng,
    phase: IterationPhase,
}

impl SampleIterator {
    /// Start iterating; the first epoch's order is drawn immediately
    ///
    /// `epoch_count` below 1 is treated as 1. A fixed `seed` makes the
    /// shuffled order reproducible.
    pub fn new(range: SampleRange, epoch_count: u32, shuffle: bool, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let mut iter = Self {
            range,
            epoch_count: epoch_count.max(1),
            epochs_done: 0,
            shuffle,
            permutation: None,
            cursor: 0,
            rng,
            phase: IterationPhase::Active,
        };
        iter.begin_epoch();
        iter
    }

    /// Produce the next sample index, `None` once all epochs are done
    pub fn next_draw(&mut self) -> Option<Draw> {
        if self.phase == IterationPhase::Exhausted {
            return None;
        }

        let index = match &self.permutation {
            Some(perm) => perm[self.cursor],
            None => self.range.start + self.cursor as u64,
        };
        let draw = Draw {
            index,
            epoch: self.epochs_done,
        };

        self.cursor += 1;
        if self.cursor as u64 == self.range.len() {
            self.end_epoch();
        }
        Some(draw)
    }

    fn end_epoch(&mut self) {
        self.epochs_done += 1;
        if self.epochs_done == self.epoch_count {
            info!(
                "All {} epoch(s) done, {} samples produced",
                self.epoch_count,
                self.total_draws()
            );
            self.phase = IterationPhase::Exhausted;
            self.permutation = None;
        } else {
            debug!("Epoch {} of {} done", self.epochs_done, self.epoch_count);
            self.begin_epoch();
        }
    }

    fn begin_epoch(&mut self) {
        self.cursor = 0;
        if self.shuffle {
            let mut perm: Vec<u64> = (self.range.start..=self.range.stop).collect();
            self.rng.shuffle(&mut perm);
            self.permutation = Some(perm);
        }
    }

    pub fn phase(&self) -> IterationPhase {
        self.phase
    }

    pub fn is_exhausted(&self) -> bool {
        self.phase == IterationPhase::Exhausted
    }

    pub fn epochs_done(&self) -> u32 {
        self.epochs_done
    }

    pub fn epoch_count(&self) -> u32 {
        self.epoch_count
    }

    pub fn range(&self) -> SampleRange {
        self.range
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    /// Samples the whole session produces: range length times epochs
    pub fn total_draws(&self) -> u64 {
        self.range.len() * self.epoch_count as u64
    }

    /// Samples still to be produced
    pub fn remaining(&self) -> u64 {
        if self.is_exhausted() {
            return 0;
        }
        let done = self.epochs_done as u64 * self.range.len() + self.cursor as u64;
        self.total_draws() - done
    }
}

impl Iterator for SampleIterator {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        self.next_draw().map(|d| d.index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining() as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ErrorKind;
    use std::collections::BTreeSet;

    fn collect_epochs(iter: &mut SampleIterator) -> Vec<Vec<u64>> {
        let mut epochs: Vec<Vec<u64>> = Vec::new();
        while let Some(draw) = iter.next_draw() {
            if epochs.len() <= draw.epoch as usize {
                epochs.push(Vec::new());
            }
            epochs[draw.epoch as usize].push(draw.index);
        }
        epochs
    }

    #[test]
    fn test_range_validation() {
        assert!(SampleRange::new(0, 9, 10).is_ok());
        assert_eq!(SampleRange::new(3, 3, 10).unwrap().len(), 1);

        let err = SampleRange::new(10, 9, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);

        let err = SampleRange::new(0, 1000, 10).unwrap_err();
        assert!(matches!(
            err,
            RepoError::SampleOutOfRange { index: 1000, total: 10 }
        ));

        let err = SampleRange::new(5, 2, 10).unwrap_err();
        assert!(matches!(err, RepoError::InvalidRange { start: 5, stop: 2 }));
    }

    #[test]
    fn test_sequential_order() {
        let range = SampleRange::new(2, 6, 10).unwrap();
        let mut iter = SampleIterator::new(range, 3, false, None);
        let epochs = collect_epochs(&mut iter);

        assert_eq!(epochs.len(), 3);
        for epoch in &epochs {
            assert_eq!(epoch, &vec![2, 3, 4, 5, 6]);
        }
        assert!(iter.is_exhausted());
        assert_eq!(iter.epochs_done(), 3);
        assert_eq!(iter.next_draw(), None);
    }

    #[test]
    fn test_shuffled_epochs_are_permutations() {
        let range = SampleRange::new(10, 49, 100).unwrap();
        let mut iter = SampleIterator::new(range, 4, true, Some(7));
        let epochs = collect_epochs(&mut iter);

        let expected: BTreeSet<u64> = (10..=49).collect();
        assert_eq!(epochs.len(), 4);
        for epoch in &epochs {
            assert_eq!(epoch.len(), 40);
            let set: BTreeSet<u64> = epoch.iter().copied().collect();
            assert_eq!(set, expected);
        }
    }

    #[test]
    fn test_shuffle_redraws_each_epoch() {
        let range = SampleRange::new(0, 99, 100).unwrap();
        let mut iter = SampleIterator::new(range, 2, true, Some(42));
        let epochs = collect_epochs(&mut iter);
        // 100! orders; two identical draws would mean the permutation is reused
        assert_ne!(epochs[0], epochs[1]);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let range = SampleRange::new(0, 31, 32).unwrap();
        let a: Vec<u64> = SampleIterator::new(range, 2, true, Some(99)).collect();
        let b: Vec<u64> = SampleIterator::new(range, 2, true, Some(99)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_total_count_and_bounds() {
        for (start, stop, epochs) in [(0u64, 0u64, 1u32), (0, 9, 2), (3, 7, 5), (9, 9, 3)] {
            let range = SampleRange::new(start, stop, 10).unwrap();
            for shuffle in [false, true] {
                let iter = SampleIterator::new(range, epochs, shuffle, None);
                assert_eq!(iter.remaining(), (stop - start + 1) * epochs as u64);
                let produced: Vec<u64> = iter.collect();
                assert_eq!(produced.len() as u64, (stop - start + 1) * epochs as u64);
                assert!(produced.iter().all(|&i| range.contains(i)));
            }
        }
    }

    #[test]
    fn test_zero_epochs_treated_as_one() {
        let range = SampleRange::new(0, 4, 5).unwrap();
        let iter = SampleIterator::new(range, 0, false, None);
        assert_eq!(iter.epoch_count(), 1);
        assert_eq!(iter.count(), 5);
    }

    #[test]
    fn test_remaining_tracks_progress() {
        let range = SampleRange::new(0, 2, 3).unwrap();
        let mut iter = SampleIterator::new(range, 2, false, None);
        assert_eq!(iter.size_hint(), (6, Some(6)));
        iter.next();
        iter.next();
        iter.next();
        assert_eq!(iter.epochs_done(), 1);
        assert_eq!(iter.remaining(), 3);
        assert_eq!(iter.phase(), IterationPhase::Active);
    }
}
