//! Mini-batch assembly.
//!
//! [`WindowBatches`] pulls windows from a sampler traversal, retrieves them
//! from a [`TabularDataset`] and stacks them into [`Batch`]es, the way a data
//! loader feeds a training loop.

use ndarray::{Array1, Array3, Axis};
use rand::RngCore;

use crate::{
    dataset::TabularDataset,
    error::{ConfigError, ModelingError, ShapeError},
    modeling::WindowItem,
    sampler::Window,
};

/// Stacked windows.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// `(batch, window, numeric + categorical width)`.
    pub features: Array3<f32>,
    /// Per-window target, present when every window of the batch has labels.
    pub targets: Option<Array1<f32>>,
}

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len_of(Axis(0))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stack(items: &[WindowItem]) -> Result<Self, ShapeError> {
        let features = items.iter().map(WindowItem::features).collect::<Vec<_>>();
        let expected = features.first().map_or((0, 0), |f| f.dim());
        let mut stacked = Array3::zeros((features.len(), expected.0, expected.1));
        for (mut slot, item) in stacked.axis_iter_mut(Axis(0)).zip(&features) {
            if item.dim() != expected {
                return Err(ShapeError::FeatureShape {
                    expected,
                    actual: item.dim(),
                });
            }
            slot.assign(item);
        }
        let targets = items
            .iter()
            .map(WindowItem::target)
            .collect::<Option<Array1<f32>>>();
        Ok(Self {
            features: stacked,
            targets,
        })
    }
}

/// Iterator of [`Batch`]es over a sequence of windows.
///
/// ```
/// use std::sync::Arc;
///
/// use ndarray::{Array2, array};
/// use tabseq_data::{
///     batch::WindowBatches,
///     dataset::TabularDataset,
///     modeling::TabularModeling,
///     sampler::{RandomSlidingWindowSampler, WindowSampler},
///     statistics::Statistics,
/// };
///
/// let modeling = TabularModeling::new(
///     array![[1.0_f32], [2.0], [3.0], [4.0], [5.0]],
///     Array2::zeros((5, 0)),
///     Some(array![[0.0_f32], [0.0], [1.0], [0.0], [1.0]]),
/// )?;
/// let dataset = TabularDataset::new(modeling, Arc::new(Statistics::new()), 2)?;
/// let sampler = RandomSlidingWindowSampler::new(&dataset, 2)?;
/// let batches = WindowBatches::new(&dataset, sampler.iter_ordered(), 3)?
///     .drop_last(true)
///     .collect::<Result<Vec<_>, _>>()?;
/// assert_eq!(batches.len(), 1);
/// assert_eq!(batches[0].features.dim(), (3, 2, 1));
/// assert_eq!(batches[0].targets, Some(array![0.0_f32, 1.0, 0.0]));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct WindowBatches<'a, I> {
    dataset: &'a TabularDataset,
    windows: I,
    batch_size: usize,
    drop_last: bool,
    rng: Option<&'a mut dyn RngCore>,
}

impl<'a, I> WindowBatches<'a, I>
where
    I: Iterator<Item = Window>,
{
    pub fn new<W>(
        dataset: &'a TabularDataset,
        windows: W,
        batch_size: usize,
    ) -> Result<Self, ConfigError>
    where
        W: IntoIterator<IntoIter = I>,
    {
        if batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(Self {
            dataset,
            windows: windows.into_iter(),
            batch_size,
            drop_last: false,
            rng: None,
        })
    }

    /// Skips a trailing batch smaller than `batch_size`.
    #[must_use]
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Random source for stochastic post-transformations.
    #[must_use]
    pub fn with_rng(mut self, rng: &'a mut dyn RngCore) -> Self {
        self.rng = Some(rng);
        self
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl<I> Iterator for WindowBatches<'_, I>
where
    I: Iterator<Item = Window>,
{
    type Item = Result<Batch, ModelingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let windows = self.windows.by_ref().take(self.batch_size).collect::<Vec<_>>();
        if windows.is_empty() || (self.drop_last && windows.len() < self.batch_size) {
            return None;
        }
        let items = windows
            .iter()
            .map(|window| match self.rng.as_deref_mut() {
                Some(rng) => self.dataset.get_with_rng(window, rng),
                None => self.dataset.get(window),
            })
            .collect::<Result<Vec<_>, _>>();
        let batch = items.and_then(|items| Batch::stack(&items).map_err(ModelingError::from));
        if let Ok(batch) = &batch {
            log::debug!("assembled batch of shape {:?}", batch.features.dim());
        }
        Some(batch)
    }
}
