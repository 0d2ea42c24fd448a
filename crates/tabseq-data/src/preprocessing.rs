//! Stock whole-dataset transformations.
//!
//! The usual preparation of flow-record data registers, in this order:
//!
//! | Order | Step | Effect |
//! |---|---|---|
//! | 1 | [`BaseCleanup`] | non-finite numeric cells become 0, then clip to `[-bound, bound]` |
//! | 2 | [`LogScale`] | numeric features mapped to `[0, 1]` on a log scale |
//! | 3 | [`CategoricalLevels`] | categorical values replaced by frequency rank codes |
//! | 4 | [`BinarizeLabels`] | label codes collapsed to benign (0) / anomalous (1) |
//!
//! [`LogScale`] and [`CategoricalLevels`] carry parameters fitted on training
//! rows (see their `fit` constructors); fitting them on the full table would
//! leak test information into the encoding.

use std::collections::HashMap;

use tabseq_stats::{descriptive::DescriptiveStats, frequency::ValueCounts};

use crate::{
    error::{ConfigError, FrameError, ProcessError, StepError},
    frame::{DataFrame, FrameExt},
    properties::DatasetProperties,
    transform::PreTransformation,
};

/// Clipping bound applied when none is configured.
pub const DEFAULT_BOUND: f64 = 100_000_000.0;

/// Number of categorical levels (including the "other" level) used by default.
pub const DEFAULT_CATEGORICAL_LEVELS: usize = 32;

/// Replaces non-finite numeric feature cells by 0 and clips to `[-bound, bound]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseCleanup {
    bound: f64,
}

impl Default for BaseCleanup {
    fn default() -> Self {
        Self {
            bound: DEFAULT_BOUND,
        }
    }
}

impl BaseCleanup {
    pub fn new(bound: f64) -> Result<Self, ConfigError> {
        if !(bound.is_finite() && bound > 0.0) {
            return Err(ConfigError::InvalidBound { bound });
        }
        Ok(Self { bound })
    }

    #[must_use]
    pub fn bound(&self) -> f64 {
        self.bound
    }
}

impl PreTransformation for BaseCleanup {
    fn name(&self) -> &str {
        "base_cleanup"
    }

    fn apply(&self, frame: &mut DataFrame, properties: &DatasetProperties) -> Result<(), StepError> {
        for name in properties.numeric_features() {
            frame.map_numeric(name, |v| {
                if v.is_finite() {
                    v.clamp(-self.bound, self.bound)
                } else {
                    0.0
                }
            })?;
        }
        Ok(())
    }
}

/// Observed `[min, max]` of one numeric feature.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub column: String,
    pub min: f64,
    pub max: f64,
}

/// Log-scales numeric features into `[0, 1]` using ranges fitted on training rows.
///
/// A value `x` maps to `ln(1 + x - min) / ln(1 + max - min)` after clamping
/// `x` to the fitted range. Constant (or empty) columns map to 0.
///
/// ```
/// use tabseq_data::{
///     frame::FrameExt as _,
///     preprocessing::LogScale,
///     properties::DatasetProperties,
///     transform::PreTransformation,
/// };
///
/// let props = DatasetProperties::new(["bytes"], Vec::<String>::new(), Vec::<String>::new(), None::<String>)?;
/// let mut frame = polars::df!("bytes" => [0.0, 99.0, 500.0])?;
/// let scale = LogScale::fit(&frame.slice_rows(0..2)?, &props)?;
/// scale.apply(&mut frame, &props)?;
/// assert_eq!(frame.numeric("bytes")?, [0.0, 1.0, 1.0]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LogScale {
    ranges: Vec<ValueRange>,
}

impl LogScale {
    /// Fits the per-feature ranges from the finite values of `frame`.
    pub fn fit(frame: &DataFrame, properties: &DatasetProperties) -> Result<Self, FrameError> {
        let ranges = properties
            .numeric_features()
            .iter()
            .map(|name| {
                let (min, max) = DescriptiveStats::new(frame.numeric(name)?.iter().copied())
                    .map_or((0.0, 0.0), |s| (s.min, s.max));
                Ok(ValueRange {
                    column: name.clone(),
                    min,
                    max,
                })
            })
            .collect::<Result<Vec<_>, FrameError>>()?;
        Ok(Self { ranges })
    }

    #[must_use]
    pub fn ranges(&self) -> &[ValueRange] {
        &self.ranges
    }
}

impl PreTransformation for LogScale {
    fn name(&self) -> &str {
        "log_scale"
    }

    fn apply(&self, frame: &mut DataFrame, _properties: &DatasetProperties) -> Result<(), StepError> {
        for ValueRange { column, min, max } in &self.ranges {
            let (min, max) = (*min, *max);
            let denominator = (max - min).ln_1p();
            frame.map_numeric(column, |v| {
                if denominator > 0.0 && !v.is_nan() {
                    (v.clamp(min, max) - min).ln_1p() / denominator
                } else {
                    0.0
                }
            })?;
        }
        Ok(())
    }
}

/// Most frequent training values of one categorical feature, by rank.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryLevels {
    pub column: String,
    pub values: Vec<String>,
}

/// Replaces categorical values by the rank of their training frequency.
///
/// The `levels - 1` most frequent values of each categorical feature get
/// codes `0..levels - 1`; every other value (rare or unseen) gets the shared
/// "other" code `levels - 1`. The resulting columns are numeric, ready to be
/// one-hot encoded with [`OneHot`](crate::postprocessing::OneHot) of the same
/// `levels`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalLevels {
    levels: usize,
    columns: Vec<CategoryLevels>,
}

impl CategoricalLevels {
    pub fn fit(
        frame: &DataFrame,
        properties: &DatasetProperties,
        levels: usize,
    ) -> Result<Self, ProcessError> {
        if levels == 0 {
            return Err(ConfigError::ZeroCategoricalLevels.into());
        }
        let columns = properties
            .categorical_features()
            .iter()
            .map(|name| {
                let values = frame.strings(name)?;
                let top = ValueCounts::new(values.iter())
                    .top_k(levels - 1)
                    .into_iter()
                    .cloned()
                    .collect();
                Ok(CategoryLevels {
                    column: name.clone(),
                    values: top,
                })
            })
            .collect::<Result<Vec<_>, FrameError>>()?;
        Ok(Self { levels, columns })
    }

    #[must_use]
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Code shared by every value outside the fitted top levels.
    #[must_use]
    pub fn other_code(&self) -> usize {
        self.levels - 1
    }

    #[must_use]
    pub fn columns(&self) -> &[CategoryLevels] {
        &self.columns
    }
}

impl PreTransformation for CategoricalLevels {
    fn name(&self) -> &str {
        "categorical_levels"
    }

    #[expect(clippy::cast_precision_loss)]
    fn apply(&self, frame: &mut DataFrame, _properties: &DatasetProperties) -> Result<(), StepError> {
        for CategoryLevels { column, values } in &self.columns {
            let rank = values
                .iter()
                .enumerate()
                .map(|(idx, value)| (value.as_str(), idx))
                .collect::<HashMap<_, _>>();
            let codes = frame
                .strings(column)?
                .iter()
                .map(|value| rank.get(value.as_str()).copied().unwrap_or(self.other_code()) as f64)
                .collect();
            frame.set_numeric(column, codes)?;
        }
        Ok(())
    }
}

/// Collapses encoded label columns to benign (0) versus anomalous (1).
///
/// Requires a benign label (which the label mapping reserves at code 0) and
/// label columns that already hold codes. Label columns missing from the
/// frame are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinarizeLabels;

impl PreTransformation for BinarizeLabels {
    fn name(&self) -> &str {
        "binarize_labels"
    }

    fn apply(&self, frame: &mut DataFrame, properties: &DatasetProperties) -> Result<(), StepError> {
        if properties.benign_label().is_none() {
            return Err(StepError::invalid(
                "binary label conversion requires a benign label",
            ));
        }
        for name in properties.labels() {
            if !frame.has_column(name) {
                continue;
            }
            frame.map_numeric(name, |v| if v == 0.0 { 0.0 } else { 1.0 })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> DatasetProperties {
        DatasetProperties::new(["bytes", "proto"], ["proto"], ["label"], Some("benign")).unwrap()
    }

    fn frame() -> DataFrame {
        polars::df!(
            "bytes" => [f64::NAN, 1e12, -5.0, f64::INFINITY, 3.0],
            "proto" => ["tcp", "udp", "tcp", "icmp", "gre"],
            "label" => [0.0, 1.0, 2.0, 0.0, 3.0]
        )
        .unwrap()
    }

    #[test]
    fn test_base_cleanup() {
        let mut frame = frame();
        BaseCleanup::new(10.0).unwrap().apply(&mut frame, &props()).unwrap();
        assert_eq!(frame.numeric("bytes").unwrap(), [0.0, 10.0, -5.0, 0.0, 3.0]);
        assert!(BaseCleanup::new(-1.0).is_err());
        assert_eq!(BaseCleanup::default().bound(), DEFAULT_BOUND);
    }

    #[test]
    fn test_log_scale_constant_column() {
        let props = props();
        let train = polars::df!(
            "bytes" => [4.0, 4.0],
            "proto" => ["tcp", "tcp"],
            "label" => [0.0, 0.0]
        )
        .unwrap();
        let scale = LogScale::fit(&train, &props).unwrap();
        assert_eq!(
            scale.ranges(),
            [ValueRange {
                column: "bytes".into(),
                min: 4.0,
                max: 4.0
            }]
        );
        let mut frame = train.clone();
        scale.apply(&mut frame, &props).unwrap();
        assert_eq!(frame.numeric("bytes").unwrap(), [0.0, 0.0]);
    }

    #[test]
    fn test_categorical_levels_other_bucket() {
        let props = props();
        let mut frame = frame();
        let levels = CategoricalLevels::fit(&frame, &props, 2).unwrap();
        assert_eq!(levels.columns()[0].values, ["tcp"]);
        assert_eq!(levels.other_code(), 1);
        levels.apply(&mut frame, &props).unwrap();
        assert_eq!(frame.numeric("proto").unwrap(), [0.0, 1.0, 0.0, 1.0, 1.0]);
        assert!(CategoricalLevels::fit(&frame, &props, 0).is_err());
    }

    #[test]
    fn test_binarize_labels() {
        let mut frame = frame();
        BinarizeLabels.apply(&mut frame, &props()).unwrap();
        assert_eq!(frame.numeric("label").unwrap(), [0.0, 1.0, 1.0, 0.0, 1.0]);

        let unsupervised =
            DatasetProperties::new(["bytes", "proto"], ["proto"], Vec::<String>::new(), None::<String>)
                .unwrap();
        assert!(BinarizeLabels.apply(&mut frame, &unsupervised).is_err());
    }
}
