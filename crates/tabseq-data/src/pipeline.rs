//! Composition of post-transformations.
//!
//! [`TransformationBuilder`] accumulates [`PostTransformation`] steps with an
//! order key; [`TransformationBuilder::build`] freezes them into an immutable,
//! cheaply clonable [`Pipeline`]. Building is a pure function of the
//! registered steps: it can be called any number of times and always yields
//! an equivalent pipeline.

use std::sync::Arc;

use crate::{
    error::{ModelingError, ShapeError, StatsMismatchError, StepError, TransformationError},
    step::OrderedSteps,
    transform::{PostTransformation, SampleContext, Tensor},
};

/// Accumulates post-transformation steps.
///
/// ```
/// use tabseq_data::{pipeline::TransformationBuilder, transform::post_fn};
///
/// let mut builder = TransformationBuilder::new();
/// builder
///     .add_step(post_fn("second", |data, _| Ok(data * 2.0_f32)), 2)
///     .add_step(post_fn("first", |data, _| Ok(data + 1.0_f32)), 1);
/// let pipeline = builder.build();
/// assert_eq!(pipeline.step_names().collect::<Vec<_>>(), ["first", "second"]);
/// ```
#[derive(Debug, Default)]
pub struct TransformationBuilder {
    steps: OrderedSteps<Arc<dyn PostTransformation>>,
}

impl TransformationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a step; steps with equal `order` run in registration order.
    pub fn add_step<T>(&mut self, transformation: T, order: i32) -> &mut Self
    where
        T: PostTransformation + 'static,
    {
        self.steps.push(Arc::new(transformation), order);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Removes every registered step.
    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Returns the registered steps as an ordered, immutable pipeline.
    #[must_use]
    pub fn build(&self) -> Pipeline {
        Pipeline {
            steps: self
                .steps
                .iter()
                .map(|s| PipelineStep {
                    order: s.order,
                    step: Arc::clone(&s.step),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct PipelineStep {
    order: i32,
    step: Arc<dyn PostTransformation>,
}

/// Ordered, immutable sequence of post-transformations.
///
/// The default pipeline is empty and returns its input unchanged.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    steps: Arc<[PipelineStep]>,
}

impl Pipeline {
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.steps.iter().map(|s| s.step.name())
    }

    /// `(order, step)` pairs in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &dyn PostTransformation)> + '_ {
        self.steps.iter().map(|s| (s.order, &*s.step))
    }

    #[must_use]
    pub fn is_stochastic(&self) -> bool {
        self.steps.iter().any(|s| s.step.is_stochastic())
    }

    /// Runs every step in order over a window tensor.
    ///
    /// Missing or mis-sized statistics surface as [`StatsMismatchError`]; any
    /// other step failure as a [`TransformationError`] tagged with the step.
    pub fn run(&self, data: Tensor, ctx: &mut SampleContext<'_>) -> Result<Tensor, ModelingError> {
        let rows = data.nrows();
        let mut data = data;
        for PipelineStep { order, step } in self.steps.iter() {
            data = step
                .apply(data, ctx)
                .map_err(|err| step_error(*order, step.name(), err))?;
            if data.nrows() != rows {
                return Err(ShapeError::StepOutput {
                    name: step.name().to_owned(),
                    expected: rows,
                    actual: data.nrows(),
                }
                .into());
            }
        }
        Ok(data)
    }
}

fn step_error(order: i32, name: &str, err: StepError) -> ModelingError {
    match err {
        StepError::MissingStatistic { key } => StatsMismatchError::Missing {
            step: name.to_owned(),
            key,
        }
        .into(),
        StepError::StatisticLength {
            key,
            expected,
            actual,
        } => StatsMismatchError::Length {
            step: name.to_owned(),
            key,
            expected,
            actual,
        }
        .into(),
        source => TransformationError {
            order,
            name: name.to_owned(),
            source,
        }
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{statistics::Statistics, transform::post_fn};

    #[test]
    fn test_build_is_repeatable_and_stable() {
        let mut builder = TransformationBuilder::new();
        builder
            .add_step(post_fn("b", |d, _| Ok(d * 10.0_f32)), 1)
            .add_step(post_fn("a", |d, _| Ok(d + 1.0_f32)), 0)
            .add_step(post_fn("c", |d, _| Ok(d - 3.0_f32)), 1);
        let first = builder.build();
        let second = builder.build();
        assert_eq!(first.step_names().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(
            first.step_names().collect::<Vec<_>>(),
            second.step_names().collect::<Vec<_>>()
        );

        let stats = Statistics::new();
        let out = first
            .run(array![[1.0_f32]], &mut SampleContext::new(&stats))
            .unwrap();
        assert_eq!(out, array![[17.0_f32]]);
    }

    #[test]
    fn test_later_registrations_do_not_change_built_pipeline() {
        let mut builder = TransformationBuilder::new();
        builder.add_step(post_fn("a", |d, _| Ok(d)), 0);
        let built = builder.build();
        builder.add_step(post_fn("b", |d, _| Ok(d)), 1);
        assert_eq!(built.len(), 1);
        assert_eq!(builder.build().len(), 2);
    }

    #[test]
    fn test_error_tagging() {
        let stats = Statistics::new();
        let mut builder = TransformationBuilder::new();
        builder.add_step(
            post_fn("needs_mean", |d, ctx| {
                ctx.require_stat("mean", d.ncols())?;
                Ok(d)
            }),
            4,
        );
        let err = builder
            .build()
            .run(array![[1.0_f32]], &mut SampleContext::new(&stats))
            .unwrap_err();
        assert_eq!(
            err,
            ModelingError::StatsMismatch(StatsMismatchError::Missing {
                step: "needs_mean".into(),
                key: "mean".into()
            })
        );

        let mut builder = TransformationBuilder::new();
        builder.add_step(post_fn("broken", |_, _| Err(StepError::invalid("boom"))), 7);
        let err = builder
            .build()
            .run(array![[1.0_f32]], &mut SampleContext::new(&stats))
            .unwrap_err();
        assert!(matches!(
            err,
            ModelingError::Transformation(TransformationError { order: 7, ref name, .. }) if name == "broken"
        ));
    }

    #[test]
    fn test_rejects_row_changing_step() {
        let stats = Statistics::new();
        let mut builder = TransformationBuilder::new();
        builder.add_step(post_fn("drop_row", |d, _| Ok(d.slice(ndarray::s![1.., ..]).to_owned())), 0);
        let err = builder
            .build()
            .run(array![[1.0_f32], [2.0]], &mut SampleContext::new(&stats))
            .unwrap_err();
        assert!(matches!(err, ModelingError::Shape(ShapeError::StepOutput { .. })));
    }
}
