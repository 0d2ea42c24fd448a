//! Normalization statistics derived from the training split.
//!
//! Statistics are computed once, from training data only, and then frozen
//! (typically behind an `Arc`) and shared by the train, validation and test
//! datasets of the same fit. Recomputing them from test data would leak
//! information into the model.
//!
//! Per-feature vectors are stored under a statistic name:
//!
//! | Key | Columns | Meaning |
//! |---|---|---|
//! | [`MEAN`] | numeric features | mean of finite values |
//! | [`STD`] | numeric features | sample standard deviation (`n - 1`) |
//! | [`MIN`] | numeric features | minimum finite value |
//! | [`MAX`] | numeric features | maximum finite value |
//! | [`CARDINALITY`] | categorical features | number of distinct values |

use std::collections::BTreeMap;

use ndarray::Array1;
use tabseq_stats::{descriptive::DescriptiveStats, frequency::ValueCounts};

use crate::{
    error::FrameError,
    frame::{DataFrame, FrameExt},
    properties::DatasetProperties,
};

pub const MEAN: &str = "mean";
pub const STD: &str = "std";
pub const MIN: &str = "min";
pub const MAX: &str = "max";
pub const CARDINALITY: &str = "cardinality";

/// Table of named per-feature statistic vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    entries: BTreeMap<String, Array1<f32>>,
}

impl Statistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the standard statistics from a (training) frame.
    ///
    /// ```
    /// use tabseq_data::{
    ///     properties::DatasetProperties,
    ///     statistics::{self, Statistics},
    /// };
    ///
    /// let props = DatasetProperties::new(["age", "city"], ["city"], ["y"], None::<String>)?;
    /// let train = polars::df!(
    ///     "age" => [20.0, 30.0, 40.0],
    ///     "city" => ["NY", "LA", "NY"],
    ///     "y" => [0.0, 1.0, 0.0]
    /// )?;
    /// let stats = Statistics::from_training(&train, &props)?;
    /// assert_eq!(stats.get(statistics::MEAN).unwrap()[0], 30.0);
    /// assert_eq!(stats.get(statistics::STD).unwrap()[0], 10.0);
    /// assert_eq!(stats.get(statistics::CARDINALITY).unwrap()[0], 2.0);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_training(
        frame: &DataFrame,
        properties: &DatasetProperties,
    ) -> Result<Self, FrameError> {
        let numeric = properties.numeric_features();
        let mut mean = Vec::with_capacity(numeric.len());
        let mut std = Vec::with_capacity(numeric.len());
        let mut min = Vec::with_capacity(numeric.len());
        let mut max = Vec::with_capacity(numeric.len());
        for name in numeric {
            let values = frame.numeric(name)?;
            let Some(summary) = DescriptiveStats::new(values.iter().copied()) else {
                log::warn!("feature '{name}' has no finite values in the training split");
                mean.push(0.0);
                std.push(0.0);
                min.push(0.0);
                max.push(0.0);
                continue;
            };
            if summary.sample_std_dev == 0.0 {
                log::warn!("feature '{name}' is constant in the training split");
            }
            mean.push(summary.mean as f32);
            std.push(summary.sample_std_dev as f32);
            min.push(summary.min as f32);
            max.push(summary.max as f32);
        }

        let cardinality = properties
            .categorical_features()
            .iter()
            .map(|name| Ok(ValueCounts::new(frame.strings(name)?).num_distinct() as f32))
            .collect::<Result<Vec<_>, FrameError>>()?;

        let mut stats = Self::new();
        stats.insert(MEAN, Array1::from(mean));
        stats.insert(STD, Array1::from(std));
        stats.insert(MIN, Array1::from(min));
        stats.insert(MAX, Array1::from(max));
        stats.insert(CARDINALITY, Array1::from(cardinality));
        log::debug!(
            "computed statistics for {} numeric and {} categorical features from {} rows",
            numeric.len(),
            properties.categorical_features().len(),
            frame.height()
        );
        Ok(stats)
    }

    /// Adds or replaces a statistic vector.
    pub fn insert(&mut self, key: impl Into<String>, values: Array1<f32>) {
        self.entries.insert(key.into(), values);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Array1<f32>> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Array1<f32>)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignores_non_finite_and_handles_empty() {
        let props =
            DatasetProperties::new(["a", "b"], Vec::<String>::new(), Vec::<String>::new(), None::<String>)
                .unwrap();
        let frame = polars::df!("a" => [1.0, f64::NAN, 3.0], "b" => [f64::NAN; 3]).unwrap();
        let stats = Statistics::from_training(&frame, &props).unwrap();
        assert_eq!(stats.get(MEAN).unwrap().to_vec(), [2.0, 0.0]);
        assert_eq!(stats.get(MIN).unwrap().to_vec(), [1.0, 0.0]);
        assert_eq!(stats.get(MAX).unwrap().to_vec(), [3.0, 0.0]);
        assert!(stats.get(CARDINALITY).unwrap().is_empty());
    }

    #[test]
    fn test_requires_numeric_columns() {
        let props =
            DatasetProperties::new(["a"], Vec::<String>::new(), Vec::<String>::new(), None::<String>)
                .unwrap();
        let frame = polars::df!("a" => ["x"]).unwrap();
        assert!(matches!(
            Statistics::from_training(&frame, &props),
            Err(FrameError::ColumnType { .. })
        ));
    }
}
