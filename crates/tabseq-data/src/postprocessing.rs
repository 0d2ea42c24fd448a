//! Stock per-window transformations.
//!
//! These run on a materialized window tensor (`window_size` rows, one column
//! per feature of one kind) every time a window is retrieved.

use ndarray::{Array2, Axis, Zip};
use rand_distr::{Distribution, Normal};

use crate::{
    error::{ConfigError, StepError},
    statistics,
    transform::{PostTransformation, SampleContext, Tensor},
};

/// Standardizes each column with the training `mean` and `std` statistics.
///
/// Columns with zero standard deviation are only centered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Standardize;

impl PostTransformation for Standardize {
    fn name(&self) -> &str {
        "standardize"
    }

    fn apply(&self, mut data: Tensor, ctx: &mut SampleContext<'_>) -> Result<Tensor, StepError> {
        let mean = ctx.require_stat(statistics::MEAN, data.ncols())?;
        let std = ctx.require_stat(statistics::STD, data.ncols())?;
        for ((mut column, &mu), &sigma) in data.axis_iter_mut(Axis(1)).zip(mean).zip(std) {
            let scale = if sigma > 0.0 { sigma } else { 1.0 };
            column.mapv_inplace(|x| (x - mu) / scale);
        }
        Ok(data)
    }
}

/// Rescales each column to `[0, 1]` with the training `min` and `max` statistics.
///
/// Values outside the training range are not clipped. Constant columns map to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinMaxScale;

impl PostTransformation for MinMaxScale {
    fn name(&self) -> &str {
        "min_max_scale"
    }

    fn apply(&self, mut data: Tensor, ctx: &mut SampleContext<'_>) -> Result<Tensor, StepError> {
        let min = ctx.require_stat(statistics::MIN, data.ncols())?;
        let max = ctx.require_stat(statistics::MAX, data.ncols())?;
        for ((mut column, &lo), &hi) in data.axis_iter_mut(Axis(1)).zip(min).zip(max) {
            let range = hi - lo;
            if range > 0.0 {
                column.mapv_inplace(|x| (x - lo) / range);
            } else {
                column.fill(0.0);
            }
        }
        Ok(data)
    }
}

/// Expands integer category codes into one-hot blocks.
///
/// A `(window, columns)` tensor of codes in `[0, levels)` becomes a
/// `(window, columns * levels)` indicator tensor; column `j`'s block starts at
/// `j * levels`.
///
/// ```
/// use ndarray::array;
/// use tabseq_data::{
///     postprocessing::OneHot,
///     statistics::Statistics,
///     transform::{PostTransformation, SampleContext},
/// };
///
/// let stats = Statistics::new();
/// let codes = array![[0.0_f32, 2.0], [1.0, 0.0]];
/// let encoded = OneHot::new(3).apply(codes, &mut SampleContext::new(&stats))?;
/// assert_eq!(
///     encoded,
///     array![[1.0_f32, 0.0, 0.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0, 0.0, 0.0]]
/// );
/// # Ok::<(), tabseq_data::error::StepError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneHot {
    levels: usize,
}

impl OneHot {
    #[must_use]
    pub fn new(levels: usize) -> Self {
        Self { levels }
    }

    #[must_use]
    pub fn levels(&self) -> usize {
        self.levels
    }
}

impl PostTransformation for OneHot {
    fn name(&self) -> &str {
        "one_hot"
    }

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn apply(&self, data: Tensor, _ctx: &mut SampleContext<'_>) -> Result<Tensor, StepError> {
        let mut encoded = Array2::zeros((data.nrows(), data.ncols() * self.levels));
        for ((row, column), &code) in data.indexed_iter() {
            if code.fract() != 0.0 || code < 0.0 || code >= self.levels as f32 {
                return Err(StepError::invalid(format!(
                    "category code {code} in column {column} is not in [0, {})",
                    self.levels
                )));
            }
            encoded[[row, column * self.levels + code as usize]] = 1.0;
        }
        Ok(encoded)
    }
}

/// Adds zero-mean Gaussian noise to every cell.
///
/// Stochastic: draws from the random source of the [`SampleContext`], so
/// retrieval with the same seed reproduces the same noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianNoise {
    std_dev: f32,
    normal: Normal<f32>,
}

impl GaussianNoise {
    /// Fails unless `std_dev` is finite and non-negative.
    pub fn new(std_dev: f32) -> Result<Self, ConfigError> {
        // Normal::new accepts a negative deviation (it mirrors the samples)
        if !(std_dev.is_finite() && std_dev >= 0.0) {
            return Err(ConfigError::InvalidNoise { std_dev });
        }
        let normal = Normal::new(0.0, std_dev).map_err(|_| ConfigError::InvalidNoise { std_dev })?;
        Ok(Self { std_dev, normal })
    }

    #[must_use]
    pub fn std_dev(&self) -> f32 {
        self.std_dev
    }
}

impl PostTransformation for GaussianNoise {
    fn name(&self) -> &str {
        "gaussian_noise"
    }

    fn is_stochastic(&self) -> bool {
        true
    }

    fn apply(&self, mut data: Tensor, ctx: &mut SampleContext<'_>) -> Result<Tensor, StepError> {
        let rng = ctx.rng()?;
        Zip::from(&mut data).for_each(|x| *x += self.normal.sample(&mut *rng));
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, array};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::statistics::Statistics;

    fn stats() -> Statistics {
        let mut stats = Statistics::new();
        stats.insert(statistics::MEAN, Array1::from(vec![10.0, 5.0]));
        stats.insert(statistics::STD, Array1::from(vec![2.0, 0.0]));
        stats.insert(statistics::MIN, Array1::from(vec![0.0, 3.0]));
        stats.insert(statistics::MAX, Array1::from(vec![20.0, 3.0]));
        stats
    }

    #[test]
    fn test_standardize() {
        let stats = stats();
        let out = Standardize
            .apply(array![[12.0, 6.0], [8.0, 5.0]], &mut SampleContext::new(&stats))
            .unwrap();
        assert_eq!(out, array![[1.0_f32, 1.0], [-1.0, 0.0]]);
    }

    #[test]
    fn test_standardize_width_mismatch() {
        let stats = stats();
        let err = Standardize
            .apply(array![[1.0_f32]], &mut SampleContext::new(&stats))
            .unwrap_err();
        assert_eq!(
            err,
            StepError::StatisticLength {
                key: statistics::MEAN.into(),
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn test_min_max_scale() {
        let stats = stats();
        let out = MinMaxScale
            .apply(array![[5.0, 3.0], [30.0, 9.0]], &mut SampleContext::new(&stats))
            .unwrap();
        assert_eq!(out, array![[0.25_f32, 0.0], [1.5, 0.0]]);
    }

    #[test]
    fn test_one_hot_rejects_out_of_range() {
        let stats = Statistics::new();
        let mut ctx = SampleContext::new(&stats);
        assert!(OneHot::new(2).apply(array![[2.0_f32]], &mut ctx).is_err());
        assert!(OneHot::new(2).apply(array![[0.5_f32]], &mut ctx).is_err());
        assert!(OneHot::new(2).apply(array![[-1.0_f32]], &mut ctx).is_err());
    }

    #[test]
    fn test_noise_requires_rng_and_is_seeded() {
        let stats = Statistics::new();
        let noise = GaussianNoise::new(0.5).unwrap();
        assert!(noise.is_stochastic());
        assert_eq!(
            noise
                .apply(Array2::zeros((2, 2)), &mut SampleContext::new(&stats))
                .unwrap_err(),
            StepError::MissingRandomSource
        );

        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            noise
                .apply(Array2::zeros((2, 2)), &mut SampleContext::with_rng(&stats, &mut rng))
                .unwrap()
        };
        assert_eq!(draw(7), draw(7));
        assert_ne!(draw(7), draw(8));
    }

    #[test]
    fn test_noise_rejects_invalid_deviation() {
        for std_dev in [-1.0, -f32::MIN_POSITIVE, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                GaussianNoise::new(std_dev),
                Err(ConfigError::InvalidNoise { .. })
            ));
        }
        assert_eq!(GaussianNoise::new(0.0).unwrap().std_dev(), 0.0);
    }
}
