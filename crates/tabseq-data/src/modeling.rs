//! Window tensor assembly.
//!
//! [`TabularModeling`] holds the numeric, categorical and (optional) label
//! matrices of one split together with one [`Pipeline`] per kind. Given a
//! window of row indices it gathers the rows in window order and runs each
//! pipeline over its slice, producing a [`WindowItem`].

use ndarray::{Array2, Axis, s};
use rand::RngCore;

use crate::{
    error::{FrameError, ModelingError, ShapeError},
    frame::{DataFrame, FrameExt},
    pipeline::Pipeline,
    properties::DatasetProperties,
    statistics::Statistics,
    transform::{SampleContext, Tensor},
};

/// Transformed tensors of one window; the window is the leading axis.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowItem {
    pub numeric: Tensor,
    pub categorical: Tensor,
    pub labels: Option<Tensor>,
}

impl WindowItem {
    /// Number of rows in the window.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.numeric.nrows()
    }

    /// Numeric and categorical tensors concatenated along the feature axis.
    #[must_use]
    pub fn features(&self) -> Tensor {
        let split = self.numeric.ncols();
        let mut features = Array2::zeros((self.window_len(), split + self.categorical.ncols()));
        features.slice_mut(s![.., ..split]).assign(&self.numeric);
        features.slice_mut(s![.., split..]).assign(&self.categorical);
        features
    }

    /// Last label column at the last window row.
    ///
    /// This is the value a classifier reading the whole window is trained to
    /// predict.
    #[must_use]
    pub fn target(&self) -> Option<f32> {
        let labels = self.labels.as_ref()?;
        let (rows, cols) = labels.dim();
        (rows > 0 && cols > 0).then(|| labels[[rows - 1, cols - 1]])
    }
}

/// Per-split tensors plus the per-kind post-transformation pipelines.
#[derive(Debug, Clone)]
pub struct TabularModeling {
    numeric: Array2<f32>,
    categorical: Array2<f32>,
    labels: Option<Array2<f32>>,
    numeric_transformation: Pipeline,
    categorical_transformation: Pipeline,
    label_transformation: Pipeline,
}

impl TabularModeling {
    /// Wraps pre-built matrices; every matrix must have the same number of rows.
    pub fn new(
        numeric: Array2<f32>,
        categorical: Array2<f32>,
        labels: Option<Array2<f32>>,
    ) -> Result<Self, ShapeError> {
        let rows = numeric.nrows();
        if categorical.nrows() != rows {
            return Err(ShapeError::RowCount {
                what: "categorical",
                expected: rows,
                actual: categorical.nrows(),
            });
        }
        if let Some(labels) = &labels
            && labels.nrows() != rows
        {
            return Err(ShapeError::RowCount {
                what: "label",
                expected: rows,
                actual: labels.nrows(),
            });
        }
        Ok(Self {
            numeric,
            categorical,
            labels,
            numeric_transformation: Pipeline::default(),
            categorical_transformation: Pipeline::default(),
            label_transformation: Pipeline::default(),
        })
    }

    /// Materializes the matrices of a processed frame.
    ///
    /// Columns follow `numeric_features`, `categorical_features` and `labels`
    /// order. Categorical and label columns must already hold numeric codes.
    /// The label matrix is omitted when the dataset is unsupervised or the
    /// frame carries none of the label columns (unlabeled inference data); a
    /// frame holding only some of them is rejected.
    ///
    /// ```
    /// use tabseq_data::{modeling::TabularModeling, properties::DatasetProperties};
    ///
    /// let props = DatasetProperties::new(["age", "city"], ["city"], ["y"], None::<String>)?;
    /// let frame = polars::df!(
    ///     "age" => [25.0, 40.0],
    ///     "city" => [0.0, 1.0],
    ///     "y" => [0.0, 1.0]
    /// )?;
    /// let modeling = TabularModeling::from_frame(&frame, &props)?;
    /// assert_eq!(modeling.num_rows(), 2);
    /// assert_eq!(modeling.numeric().dim(), (2, 1));
    /// assert!(modeling.labels().is_some());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_frame(
        frame: &DataFrame,
        properties: &DatasetProperties,
    ) -> Result<Self, FrameError> {
        let numeric = matrix(frame, properties.numeric_features())?;
        let categorical = matrix(frame, properties.categorical_features())?;
        let labels = if properties.is_supervised() {
            let (present, missing): (Vec<_>, Vec<_>) = properties
                .labels()
                .iter()
                .partition(|name| frame.has_column(name));
            match (present.is_empty(), missing.first()) {
                (true, _) => None,
                (false, Some(name)) => {
                    return Err(FrameError::MissingColumn {
                        name: (*name).clone(),
                    });
                }
                (false, None) => Some(matrix(frame, properties.labels())?),
            }
        } else {
            None
        };
        log::debug!(
            "materialized {} rows: numeric {:?}, categorical {:?}, labels {:?}",
            frame.height(),
            numeric.dim(),
            categorical.dim(),
            labels.as_ref().map(Array2::dim)
        );
        Ok(Self {
            numeric,
            categorical,
            labels,
            numeric_transformation: Pipeline::default(),
            categorical_transformation: Pipeline::default(),
            label_transformation: Pipeline::default(),
        })
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.numeric.nrows()
    }

    #[must_use]
    pub fn numeric(&self) -> &Array2<f32> {
        &self.numeric
    }

    #[must_use]
    pub fn categorical(&self) -> &Array2<f32> {
        &self.categorical
    }

    #[must_use]
    pub fn labels(&self) -> Option<&Array2<f32>> {
        self.labels.as_ref()
    }

    pub fn set_numeric_transformation(&mut self, pipeline: Pipeline) {
        self.numeric_transformation = pipeline;
    }

    pub fn set_categorical_transformation(&mut self, pipeline: Pipeline) {
        self.categorical_transformation = pipeline;
    }

    pub fn set_label_transformation(&mut self, pipeline: Pipeline) {
        self.label_transformation = pipeline;
    }

    #[must_use]
    pub fn numeric_transformation(&self) -> &Pipeline {
        &self.numeric_transformation
    }

    #[must_use]
    pub fn categorical_transformation(&self) -> &Pipeline {
        &self.categorical_transformation
    }

    #[must_use]
    pub fn label_transformation(&self) -> &Pipeline {
        &self.label_transformation
    }

    /// Whether any configured pipeline needs a random source.
    #[must_use]
    pub fn is_stochastic(&self) -> bool {
        self.numeric_transformation.is_stochastic()
            || self.categorical_transformation.is_stochastic()
            || self.label_transformation.is_stochastic()
    }

    /// Gathers the rows of `window` and runs the three pipelines.
    ///
    /// Fails with [`ShapeError`] for an empty window or an out-of-range row,
    /// and with [`StatsMismatchError`](crate::error::StatsMismatchError) when
    /// `stats` lacks an entry a step requires. Stochastic steps fail; use
    /// [`apply_transformation_with_rng`](Self::apply_transformation_with_rng)
    /// for them.
    pub fn apply_transformation(
        &self,
        window: &[usize],
        stats: &Statistics,
    ) -> Result<WindowItem, ModelingError> {
        self.assemble(window, stats, None)
    }

    /// Like [`apply_transformation`](Self::apply_transformation), with a
    /// random source for stochastic steps.
    pub fn apply_transformation_with_rng(
        &self,
        window: &[usize],
        stats: &Statistics,
        rng: &mut dyn RngCore,
    ) -> Result<WindowItem, ModelingError> {
        self.assemble(window, stats, Some(rng))
    }

    fn assemble(
        &self,
        window: &[usize],
        stats: &Statistics,
        mut rng: Option<&mut dyn RngCore>,
    ) -> Result<WindowItem, ModelingError> {
        if window.is_empty() {
            return Err(ModelingError::Shape(ShapeError::EmptyWindow));
        }
        let len = self.num_rows();
        if let Some(&index) = window.iter().find(|&&index| index >= len) {
            return Err(ShapeError::IndexOutOfRange { index, len }.into());
        }

        let mut run = |pipeline: &Pipeline, source: &Array2<f32>| {
            let data = source.select(Axis(0), window);
            let mut ctx = match rng.as_deref_mut() {
                Some(rng) => SampleContext::with_rng(stats, rng),
                None => SampleContext::new(stats),
            };
            pipeline.run(data, &mut ctx)
        };
        let numeric = run(&self.numeric_transformation, &self.numeric)?;
        let categorical = run(&self.categorical_transformation, &self.categorical)?;
        let labels = self
            .labels
            .as_ref()
            .map(|labels| run(&self.label_transformation, labels))
            .transpose()?;
        log::trace!(
            "window {window:?}: numeric {:?}, categorical {:?}",
            numeric.dim(),
            categorical.dim()
        );
        Ok(WindowItem {
            numeric,
            categorical,
            labels,
        })
    }
}

#[expect(clippy::cast_possible_truncation)]
fn matrix(frame: &DataFrame, columns: &[String]) -> Result<Array2<f32>, FrameError> {
    let columns = columns
        .iter()
        .map(|name| frame.numeric(name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Array2::from_shape_fn(
        (frame.height(), columns.len()),
        |(row, col)| columns[col][row] as f32,
    ))
}
