//! Window-indexed retrieval over one split.

use std::sync::Arc;

use rand::RngCore;

use crate::{
    error::{ConfigError, ModelingError, ShapeError},
    modeling::{TabularModeling, WindowItem},
    statistics::Statistics,
};

/// Read-only dataset handing out transformed windows of a fixed size.
///
/// The statistics table is shared (`Arc`) so the train, validation and test
/// datasets of one fit normalize with the same training statistics. Once
/// built, the dataset is `Send + Sync` and may be read from several threads
/// at once.
///
/// ```
/// use std::sync::Arc;
///
/// use ndarray::array;
/// use tabseq_data::{dataset::TabularDataset, modeling::TabularModeling, statistics::Statistics};
///
/// let modeling = TabularModeling::new(
///     array![[25.0_f32], [40.0], [30.0]],
///     array![[0.0_f32], [1.0], [0.0]],
///     Some(array![[0.0_f32], [1.0], [0.0]]),
/// )?;
/// let dataset = TabularDataset::new(modeling, Arc::new(Statistics::new()), 2)?;
/// assert_eq!(dataset.len(), 2);
/// let item = dataset.get(&[1, 2])?;
/// assert_eq!(item.labels.unwrap(), array![[1.0_f32], [0.0]]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct TabularDataset {
    modeling: TabularModeling,
    stats: Arc<Statistics>,
    window_size: usize,
}

impl TabularDataset {
    pub fn new(
        modeling: TabularModeling,
        stats: Arc<Statistics>,
        window_size: usize,
    ) -> Result<Self, ConfigError> {
        if window_size == 0 {
            return Err(ConfigError::ZeroWindowSize);
        }
        let len = modeling.num_rows();
        if window_size > len {
            return Err(ConfigError::WindowTooLarge { window_size, len });
        }
        Ok(Self {
            modeling,
            stats,
            window_size,
        })
    }

    /// Number of distinct contiguous windows, `num_rows - window_size + 1`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.num_rows() + 1 - self.window_size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.modeling.num_rows()
    }

    #[must_use]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    #[must_use]
    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.stats
    }

    #[must_use]
    pub fn modeling(&self) -> &TabularModeling {
        &self.modeling
    }

    /// Mutable access for (re)configuring the post-transformation pipelines.
    pub fn modeling_mut(&mut self) -> &mut TabularModeling {
        &mut self.modeling
    }

    /// Transformed tensors of `window`, which must hold exactly `window_size` rows.
    pub fn get(&self, window: &[usize]) -> Result<WindowItem, ModelingError> {
        self.check_window(window)?;
        self.modeling.apply_transformation(window, &self.stats)
    }

    /// Like [`get`](Self::get), with a random source for stochastic steps.
    pub fn get_with_rng(
        &self,
        window: &[usize],
        rng: &mut dyn RngCore,
    ) -> Result<WindowItem, ModelingError> {
        self.check_window(window)?;
        self.modeling
            .apply_transformation_with_rng(window, &self.stats, rng)
    }

    fn check_window(&self, window: &[usize]) -> Result<(), ShapeError> {
        if window.len() == self.window_size {
            Ok(())
        } else {
            Err(ShapeError::WindowLength {
                expected: self.window_size,
                actual: window.len(),
            })
        }
    }
}
