use std::collections::BTreeMap;

/// Occurrence counts of the distinct values of a discrete column.
///
/// Values are kept in a [`BTreeMap`], so iteration order (and therefore every
/// derived level list) is deterministic regardless of row order.
///
/// # Examples
///
/// ```
/// use tabseq_stats::frequency::ValueCounts;
///
/// let counts = ValueCounts::new(["a", "b", "a"]);
/// assert_eq!(counts.get(&"a"), 2);
/// assert_eq!(counts.total(), 3);
/// assert_eq!(counts.num_distinct(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCounts<T> {
    counts: BTreeMap<T, usize>,
    total: usize,
}

impl<T> Default for ValueCounts<T> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
            total: 0,
        }
    }
}

impl<T> ValueCounts<T>
where
    T: Ord,
{
    /// Counts every value produced by the iterator.
    #[must_use]
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut this = Self::default();
        for value in values {
            this.add(value);
        }
        this
    }

    /// Records one more occurrence of `value`.
    pub fn add(&mut self, value: T) {
        *self.counts.entry(value).or_default() += 1;
        self.total += 1;
    }

    /// Returns the number of occurrences of `value`.
    #[must_use]
    pub fn get(&self, value: &T) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Total number of values counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of distinct values.
    #[must_use]
    pub fn num_distinct(&self) -> usize {
        self.counts.len()
    }

    /// Iterates `(value, count)` pairs in ascending value order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, usize)> + '_ {
        self.counts.iter().map(|(value, count)| (value, *count))
    }

    /// Returns the `k` most frequent values, most frequent first.
    ///
    /// Ties are broken by ascending value order.
    ///
    /// # Examples
    ///
    /// ```
    /// use tabseq_stats::frequency::ValueCounts;
    ///
    /// let counts = ValueCounts::new([3, 1, 1, 2, 2, 5]);
    /// assert_eq!(counts.top_k(2), vec![1, 2]);
    /// assert_eq!(counts.top_k(10), vec![1, 2, 3, 5]);
    /// ```
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<T>
    where
        T: Clone,
    {
        let mut entries = self.counts.iter().collect::<Vec<_>>();
        // stable sort keeps ascending value order among equal counts
        entries.sort_by(|(_, a), (_, b)| b.cmp(a));
        entries
            .into_iter()
            .take(k)
            .map(|(value, _)| value.clone())
            .collect()
    }

    /// Computes inverse-frequency class weights normalized to sum to 1.
    ///
    /// Rare classes receive larger weights, which is used to rebalance the
    /// loss of a classifier trained on skewed (e.g. mostly benign) data.
    ///
    /// # Examples
    ///
    /// ```
    /// use tabseq_stats::frequency::ValueCounts;
    ///
    /// let counts = ValueCounts::new([0, 0, 0, 1]);
    /// let weights = counts.class_weights();
    /// assert!((weights[&0] - 0.25).abs() < 1e-12);
    /// assert!((weights[&1] - 0.75).abs() < 1e-12);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn class_weights(&self) -> BTreeMap<T, f64>
    where
        T: Clone,
    {
        let total = self.total as f64;
        let inverse = self
            .counts
            .iter()
            .map(|(value, count)| (value.clone(), total / *count as f64))
            .collect::<BTreeMap<_, _>>();
        let sum = inverse.values().sum::<f64>();
        inverse
            .into_iter()
            .map(|(value, weight)| (value, weight / sum))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_counts() {
        let counts = ValueCounts::<String>::new([]);
        assert_eq!(counts.total(), 0);
        assert!(counts.top_k(3).is_empty());
        assert!(counts.class_weights().is_empty());
    }

    #[test]
    fn test_top_k_tie_break() {
        let counts = ValueCounts::new(["b", "a", "c", "c"]);
        assert_eq!(counts.top_k(3), vec!["c", "a", "b"]);
        assert_eq!(counts.top_k(0), Vec::<&str>::new());
    }

    #[test]
    fn test_class_weights_balanced() {
        let counts = ValueCounts::new(["x", "y", "x", "y"]);
        let weights = counts.class_weights();
        assert!((weights["x"] - 0.5).abs() < 1e-12);
        assert!((weights["y"] - 0.5).abs() < 1e-12);
    }
}
