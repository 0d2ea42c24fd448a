//! Transformation step contracts.
//!
//! The pipeline runs two kinds of user supplied steps:
//!
//! - [`PreTransformation`]: mutates the whole [`DataFrame`] in place once,
//!   while the [`Processor`](crate::processor::Processor) prepares the data
//!   (cleaning, imputing, deriving or encoding columns)
//! - [`PostTransformation`]: maps one materialized window tensor at
//!   retrieval time (scaling, one-hot encoding, augmentation)
//!
//! Both are object safe so heterogeneous steps can be registered side by
//! side; closures are adapted with [`pre_fn`] and [`post_fn`].
//!
//! Post-transformations are expected to be pure. A step that needs
//! randomness reports [`PostTransformation::is_stochastic`] and draws from the
//! random source carried by its [`SampleContext`], never from global state.

use std::{borrow::Cow, fmt};

use ndarray::{Array1, Array2};
use rand::RngCore;

use crate::{
    error::StepError, frame::DataFrame, properties::DatasetProperties, statistics::Statistics,
};

/// Window tensor: one row per window position, one column per feature.
pub type Tensor = Array2<f32>;

/// Whole-dataset mutation applied before splitting.
///
/// Steps may read and write only columns named by the dataset properties
/// (features and labels) and must not reorder rows: sequential consumers
/// window over row order.
pub trait PreTransformation: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, frame: &mut DataFrame, properties: &DatasetProperties)
    -> Result<(), StepError>;
}

pub type BoxedPreTransformation = Box<dyn PreTransformation>;

/// Per-sample context handed to every post-transformation.
pub struct SampleContext<'a> {
    stats: &'a Statistics,
    rng: Option<&'a mut dyn RngCore>,
}

impl fmt::Debug for SampleContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleContext")
            .field("stats", &self.stats)
            .field("rng", &self.rng.is_some())
            .finish()
    }
}

impl<'a> SampleContext<'a> {
    #[must_use]
    pub fn new(stats: &'a Statistics) -> Self {
        Self { stats, rng: None }
    }

    #[must_use]
    pub fn with_rng(stats: &'a Statistics, rng: &'a mut dyn RngCore) -> Self {
        Self {
            stats,
            rng: Some(rng),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &'a Statistics {
        self.stats
    }

    /// Looks up a statistic that must cover exactly `width` columns.
    pub fn require_stat(&self, key: &str, width: usize) -> Result<&'a Array1<f32>, StepError> {
        let values = self
            .stats
            .get(key)
            .ok_or_else(|| StepError::MissingStatistic {
                key: key.to_owned(),
            })?;
        if values.len() != width {
            return Err(StepError::StatisticLength {
                key: key.to_owned(),
                expected: width,
                actual: values.len(),
            });
        }
        Ok(values)
    }

    pub fn rng(&mut self) -> Result<&mut (dyn RngCore + 'a), StepError> {
        self.rng
            .as_deref_mut()
            .ok_or(StepError::MissingRandomSource)
    }
}

/// Per-window mapping applied at retrieval time.
///
/// The output must keep the window as its leading axis (same number of rows);
/// the number of columns may change (e.g. one-hot encoding).
pub trait PostTransformation: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Whether the step draws from [`SampleContext::rng`].
    fn is_stochastic(&self) -> bool {
        false
    }

    fn apply(&self, data: Tensor, ctx: &mut SampleContext<'_>) -> Result<Tensor, StepError>;
}

/// Closure-backed [`PreTransformation`].
pub struct FnPreTransformation<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> fmt::Debug for FnPreTransformation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnPreTransformation")
            .field(&self.name)
            .finish()
    }
}

/// Wraps a closure as a named [`PreTransformation`].
///
/// ```
/// use tabseq_data::{frame::FrameExt as _, transform::pre_fn};
///
/// let clip = pre_fn("clip", |frame, props| {
///     for name in props.numeric_features() {
///         frame.map_numeric(name, |v| v.min(1.0))?;
///     }
///     Ok(())
/// });
/// # let _ = clip;
/// ```
pub fn pre_fn<F>(name: impl Into<Cow<'static, str>>, f: F) -> FnPreTransformation<F>
where
    F: Fn(&mut DataFrame, &DatasetProperties) -> Result<(), StepError> + Send + Sync,
{
    FnPreTransformation {
        name: name.into(),
        f,
    }
}

impl<F> PreTransformation for FnPreTransformation<F>
where
    F: Fn(&mut DataFrame, &DatasetProperties) -> Result<(), StepError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(
        &self,
        frame: &mut DataFrame,
        properties: &DatasetProperties,
    ) -> Result<(), StepError> {
        (self.f)(frame, properties)
    }
}

/// Closure-backed deterministic [`PostTransformation`].
pub struct FnPostTransformation<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> fmt::Debug for FnPostTransformation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnPostTransformation")
            .field(&self.name)
            .finish()
    }
}

/// Wraps a closure as a named [`PostTransformation`].
///
/// ```
/// use tabseq_data::transform::post_fn;
///
/// let double = post_fn("double", |data, _ctx| Ok(data * 2.0_f32));
/// # let _ = double;
/// ```
pub fn post_fn<F>(name: impl Into<Cow<'static, str>>, f: F) -> FnPostTransformation<F>
where
    F: Fn(Tensor, &mut SampleContext<'_>) -> Result<Tensor, StepError> + Send + Sync,
{
    FnPostTransformation {
        name: name.into(),
        f,
    }
}

impl<F> PostTransformation for FnPostTransformation<F>
where
    F: Fn(Tensor, &mut SampleContext<'_>) -> Result<Tensor, StepError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, data: Tensor, ctx: &mut SampleContext<'_>) -> Result<Tensor, StepError> {
        (self.f)(data, ctx)
    }
}
