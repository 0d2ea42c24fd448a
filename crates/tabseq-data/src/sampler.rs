//! Index window samplers.
//!
//! A sampler only needs the number of rows of the dataset it drives (see
//! [`RowCount`]); it never reads row content. Each iteration is a fresh,
//! finite traversal: [`WindowSampler::iter`] reshuffles with thread-local
//! randomness, [`WindowSampler::iter_with_rng`] with a caller supplied
//! generator for reproducible runs, and [`WindowSampler::iter_ordered`]
//! enumerates the windows deterministically.
//!
//! | Sampler | Windows |
//! |---|---|
//! | [`RandomSlidingWindowSampler`] | every contiguous run of `window_size` rows |
//! | [`GroupWindowSampler`] | every contiguous run of `window_size` rows inside one group |
//! | [`FairSlidingWindowSampler`] | windows ending at benign and anomalous rows, alternating |

use std::{iter::FusedIterator, ops::Range};

use rand::{Rng, seq::SliceRandom};

use crate::{
    dataset::TabularDataset,
    error::{ConfigError, FrameError},
    frame::{DataFrame, FrameExt},
    modeling::TabularModeling,
};

/// Row indices of one window, in sequence order.
pub type Window = Vec<usize>;

/// Anything with a number of rows a sampler can window over.
pub trait RowCount {
    fn num_rows(&self) -> usize;
}

impl RowCount for DataFrame {
    fn num_rows(&self) -> usize {
        self.height()
    }
}

impl RowCount for TabularModeling {
    fn num_rows(&self) -> usize {
        TabularModeling::num_rows(self)
    }
}

impl RowCount for TabularDataset {
    fn num_rows(&self) -> usize {
        TabularDataset::num_rows(self)
    }
}

impl RowCount for usize {
    fn num_rows(&self) -> usize {
        *self
    }
}

/// One traversal over the windows of a sampler.
///
/// Each window is the `window_size` consecutive row indices beginning at one
/// of `starts`, visited in `starts` order.
#[derive(Debug, Clone)]
pub struct Windows {
    starts: Vec<usize>,
    pos: usize,
    window_size: usize,
}

impl Windows {
    fn new(starts: Vec<usize>, window_size: usize) -> Self {
        Self {
            starts,
            pos: 0,
            window_size,
        }
    }

    /// Shuffles the order of the windows not yet yielded.
    pub fn shuffle<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.starts[self.pos..].shuffle(rng);
    }
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Self::Item> {
        let start = *self.starts.get(self.pos)?;
        self.pos += 1;
        Some((start..start + self.window_size).collect())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.starts.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows {}

impl FusedIterator for Windows {}

/// Common interface of the window samplers.
pub trait WindowSampler {
    fn window_size(&self) -> usize;

    /// Number of windows in one full traversal.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deterministic enumeration of every window.
    fn iter_ordered(&self) -> Windows;

    /// A traversal in an order drawn from `rng`.
    fn iter_with_rng<R>(&self, rng: &mut R) -> Windows
    where
        R: Rng + ?Sized,
    {
        let mut windows = self.iter_ordered();
        windows.shuffle(rng);
        windows
    }

    /// A traversal in an order drawn from thread-local randomness.
    fn iter(&self) -> Windows {
        self.iter_with_rng(&mut rand::rng())
    }
}

fn check_window_size(window_size: usize, len: usize) -> Result<(), ConfigError> {
    if window_size == 0 {
        return Err(ConfigError::ZeroWindowSize);
    }
    if window_size > len {
        return Err(ConfigError::WindowTooLarge { window_size, len });
    }
    Ok(())
}

/// Every contiguous window of the dataset, in random order.
///
/// ```
/// use rand::{SeedableRng, rngs::StdRng};
/// use tabseq_data::sampler::{RandomSlidingWindowSampler, WindowSampler};
///
/// let sampler = RandomSlidingWindowSampler::new(&3_usize, 2)?;
/// assert_eq!(sampler.len(), 2);
/// assert_eq!(sampler.iter_ordered().collect::<Vec<_>>(), [vec![0, 1], vec![1, 2]]);
///
/// let mut rng = StdRng::seed_from_u64(0);
/// let mut shuffled = sampler.iter_with_rng(&mut rng).collect::<Vec<_>>();
/// shuffled.sort();
/// assert_eq!(shuffled, [vec![0, 1], vec![1, 2]]);
/// # Ok::<(), tabseq_data::error::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomSlidingWindowSampler {
    num_rows: usize,
    window_size: usize,
}

impl RandomSlidingWindowSampler {
    /// Fails if `window_size` is zero or exceeds the number of rows.
    pub fn new<D>(dataset: &D, window_size: usize) -> Result<Self, ConfigError>
    where
        D: RowCount + ?Sized,
    {
        let num_rows = dataset.num_rows();
        check_window_size(window_size, num_rows)?;
        Ok(Self {
            num_rows,
            window_size,
        })
    }
}

impl WindowSampler for RandomSlidingWindowSampler {
    fn window_size(&self) -> usize {
        self.window_size
    }

    fn len(&self) -> usize {
        self.num_rows + 1 - self.window_size
    }

    fn iter_ordered(&self) -> Windows {
        Windows::new((0..self.len()).collect(), self.window_size)
    }
}

/// Contiguous windows that never cross a group boundary.
///
/// A group is a maximal run of consecutive rows sharing one key; every key
/// change is a boundary, so a key that reappears later starts a new group.
/// Windows are `window_size` consecutive rows of one group. Groups shorter
/// than the window contribute nothing.
///
/// ```
/// use tabseq_data::sampler::{GroupWindowSampler, WindowSampler};
///
/// let sessions = ["a", "a", "a", "b", "b", "a"];
/// let sampler = GroupWindowSampler::new(&sessions.len(), &sessions, 2)?;
/// assert_eq!(sampler.num_groups(), 3);
/// assert_eq!(
///     sampler.iter_ordered().collect::<Vec<_>>(),
///     [vec![0, 1], vec![1, 2], vec![3, 4]]
/// );
/// # Ok::<(), tabseq_data::error::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupWindowSampler {
    /// `(start, len)` of each group, in row order.
    groups: Vec<(usize, usize)>,
    starts: Vec<usize>,
    window_size: usize,
}

impl GroupWindowSampler {
    /// `keys` holds the group key of every row of `dataset`.
    pub fn new<D, K>(dataset: &D, keys: &[K], window_size: usize) -> Result<Self, ConfigError>
    where
        D: RowCount + ?Sized,
        K: PartialEq,
    {
        let num_rows = dataset.num_rows();
        if keys.len() != num_rows {
            return Err(ConfigError::LengthMismatch {
                what: "group keys",
                expected: num_rows,
                actual: keys.len(),
            });
        }
        check_window_size(window_size, num_rows)?;

        let mut groups = vec![];
        let mut starts = vec![];
        let mut start = 0;
        for run in keys.chunk_by(|a, b| a == b) {
            if run.len() >= window_size {
                starts.extend(start..=start + run.len() - window_size);
            }
            groups.push((start, run.len()));
            start += run.len();
        }
        log::debug!(
            "{} groups yield {} windows of size {window_size}",
            groups.len(),
            starts.len()
        );
        Ok(Self {
            groups,
            starts,
            window_size,
        })
    }

    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Row range of each group, in row order.
    pub fn groups(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.groups.iter().map(|&(start, len)| start..start + len)
    }
}

impl WindowSampler for GroupWindowSampler {
    fn window_size(&self) -> usize {
        self.window_size
    }

    fn len(&self) -> usize {
        self.starts.len()
    }

    fn iter_ordered(&self) -> Windows {
        Windows::new(self.starts.clone(), self.window_size)
    }
}

/// Group keys of every row, read from `column` of `frame`.
///
/// Read the keys from the raw table (sliced to the rows of the split), not
/// from a processed one: a pre-step may have re-encoded the column and merged
/// distinct keys.
pub fn group_keys(frame: &DataFrame, column: &str) -> Result<Vec<String>, FrameError> {
    frame.strings(column)
}

/// Balanced windows for anomaly detection.
///
/// Considers every window ending at a row `>= window_size - 1` and sorts it
/// by whether that last row is benign. This includes the window starting at
/// row 0, which a strict `> window_size - 1` bound would skip.
///
/// Each traversal shuffles both pools independently and alternates anomalous
/// and benign windows until the smaller pool is exhausted, so a traversal holds
/// `2 * min(#anomalous, #benign)` windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FairSlidingWindowSampler {
    benign_starts: Vec<usize>,
    anomalous_starts: Vec<usize>,
    window_size: usize,
}

impl FairSlidingWindowSampler {
    /// `is_benign[row]` tells whether `row` carries the benign label.
    pub fn new<D>(dataset: &D, is_benign: &[bool], window_size: usize) -> Result<Self, ConfigError>
    where
        D: RowCount + ?Sized,
    {
        let num_rows = dataset.num_rows();
        if is_benign.len() != num_rows {
            return Err(ConfigError::LengthMismatch {
                what: "benign flags",
                expected: num_rows,
                actual: is_benign.len(),
            });
        }
        check_window_size(window_size, num_rows)?;
        let (benign_starts, anomalous_starts): (Vec<_>, Vec<_>) =
            (0..=num_rows - window_size).partition(|&start| is_benign[start + window_size - 1]);
        if benign_starts.is_empty() || anomalous_starts.is_empty() {
            log::warn!(
                "balanced sampling yields no windows: {} benign, {} anomalous candidates",
                benign_starts.len(),
                anomalous_starts.len()
            );
        }
        Ok(Self {
            benign_starts,
            anomalous_starts,
            window_size,
        })
    }

    fn interleave(&self, benign: &[usize], anomalous: &[usize]) -> Windows {
        let starts = anomalous
            .iter()
            .zip(benign)
            .flat_map(|(&a, &b)| [a, b])
            .collect();
        Windows::new(starts, self.window_size)
    }
}

impl WindowSampler for FairSlidingWindowSampler {
    fn window_size(&self) -> usize {
        self.window_size
    }

    fn len(&self) -> usize {
        2 * self.benign_starts.len().min(self.anomalous_starts.len())
    }

    fn iter_ordered(&self) -> Windows {
        self.interleave(&self.benign_starts, &self.anomalous_starts)
    }

    fn iter_with_rng<R>(&self, rng: &mut R) -> Windows
    where
        R: Rng + ?Sized,
    {
        let mut benign = self.benign_starts.clone();
        let mut anomalous = self.anomalous_starts.clone();
        benign.shuffle(rng);
        anomalous.shuffle(rng);
        self.interleave(&benign, &anomalous)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn test_sliding_windows_are_complete_and_contiguous() {
        let mut rng = StdRng::seed_from_u64(42);
        for len in 1..12_usize {
            for window_size in 1..=len {
                let sampler = RandomSlidingWindowSampler::new(&len, window_size).unwrap();
                let windows = sampler.iter_with_rng(&mut rng).collect::<Vec<_>>();
                assert_eq!(windows.len(), len - window_size + 1);
                assert!(
                    windows
                        .iter()
                        .all(|w| w.len() == window_size && w.windows(2).all(|p| p[1] == p[0] + 1))
                );
                let shuffled = windows.into_iter().collect::<BTreeSet<_>>();
                let ordered = sampler.iter_ordered().collect::<BTreeSet<_>>();
                assert_eq!(shuffled, ordered);
                assert_eq!(shuffled.len(), sampler.len());
            }
        }
    }

    #[test]
    fn test_traversals_are_fresh() {
        let sampler = RandomSlidingWindowSampler::new(&50_usize, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let first = sampler.iter_with_rng(&mut rng).collect::<Vec<_>>();
        let second = sampler.iter_with_rng(&mut rng).collect::<Vec<_>>();
        assert_ne!(first, second);
        assert_eq!(sampler.iter().len(), 48);

        let mut partial = sampler.iter_ordered();
        partial.next();
        assert_eq!(partial.len(), 47);
        assert_eq!(sampler.iter_ordered().len(), 48);
    }

    #[test]
    fn test_invalid_window_size() {
        assert_eq!(
            RandomSlidingWindowSampler::new(&3_usize, 4),
            Err(ConfigError::WindowTooLarge {
                window_size: 4,
                len: 3
            })
        );
        assert_eq!(
            RandomSlidingWindowSampler::new(&3_usize, 0),
            Err(ConfigError::ZeroWindowSize)
        );
        assert!(GroupWindowSampler::new(&2_usize, &[1, 1], 3).is_err());
        assert!(GroupWindowSampler::new(&3_usize, &[1, 1], 1).is_err());
    }

    #[test]
    fn test_group_windows_stay_in_group() {
        let keys = [0, 0, 1, 1, 1, 2, 0, 1, 3, 3, 3, 3];
        let mut rng = StdRng::seed_from_u64(3);
        for window_size in 1..=5 {
            let sampler = GroupWindowSampler::new(&keys.len(), &keys, window_size).unwrap();
            let expected = sampler
                .groups()
                .map(|g| (g.len() + 1).saturating_sub(window_size))
                .sum::<usize>();
            let windows = sampler.iter_with_rng(&mut rng).collect::<Vec<_>>();
            assert_eq!(windows.len(), expected);
            assert_eq!(sampler.len(), expected);
            for window in &windows {
                assert_eq!(window.len(), window_size);
                assert!(window.iter().all(|&row| keys[row] == keys[window[0]]));
                assert!(window.windows(2).all(|p| p[1] == p[0] + 1));
            }
        }
    }

    #[test]
    fn test_key_change_is_a_boundary() {
        let keys = ["a", "b", "a", "b"];
        let sampler = GroupWindowSampler::new(&keys.len(), &keys, 2).unwrap();
        assert_eq!(sampler.num_groups(), 4);
        assert!(sampler.is_empty());

        let keys = ["a", "a", "b", "a", "a"];
        let sampler = GroupWindowSampler::new(&keys.len(), &keys, 2).unwrap();
        assert_eq!(sampler.groups().collect::<Vec<_>>(), [0..2, 2..3, 3..5]);
        assert_eq!(
            sampler.iter_ordered().collect::<Vec<_>>(),
            [vec![0, 1], vec![3, 4]]
        );
    }

    #[test]
    fn test_group_keys_from_frame() {
        let frame = polars::df!("session" => [1, 1, 2]).unwrap();
        let keys = group_keys(&frame, "session").unwrap();
        let sampler = GroupWindowSampler::new(&frame, &keys, 2).unwrap();
        assert_eq!(sampler.iter_ordered().collect::<Vec<_>>(), [vec![0, 1]]);
        assert!(group_keys(&frame, "missing").is_err());
    }

    #[test]
    fn test_fair_sampler_balances() {
        // window ends: rows 1..=7; benign ends at 1, 2, 3, 6
        let benign = [true, true, true, true, false, false, true, false];
        let sampler = FairSlidingWindowSampler::new(&benign.len(), &benign, 2).unwrap();
        assert_eq!(sampler.len(), 6);

        let mut rng = StdRng::seed_from_u64(11);
        let windows = sampler.iter_with_rng(&mut rng).collect::<Vec<_>>();
        assert_eq!(windows.len(), 6);
        for (idx, window) in windows.iter().enumerate() {
            let last = *window.last().unwrap();
            assert_eq!(benign[last], idx % 2 == 1);
            assert_eq!(window, &[last - 1, last]);
        }
        let anomalous_ends = windows
            .iter()
            .step_by(2)
            .map(|w| w[1])
            .collect::<BTreeSet<_>>();
        assert_eq!(anomalous_ends, BTreeSet::from([4, 5, 7]));
    }

    #[test]
    fn test_fair_sampler_includes_first_window() {
        let benign = [true, false, true];
        let sampler = FairSlidingWindowSampler::new(&benign.len(), &benign, 2).unwrap();
        assert_eq!(sampler.len(), 2);
        let windows = sampler.iter().collect::<Vec<_>>();
        assert_eq!(windows, [vec![0, 1], vec![1, 2]]);
    }

    #[test]
    fn test_fair_sampler_without_anomalies() {
        let sampler = FairSlidingWindowSampler::new(&3_usize, &[true; 3], 1).unwrap();
        assert!(sampler.is_empty());
        assert_eq!(sampler.iter().count(), 0);
    }
}
