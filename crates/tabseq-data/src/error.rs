//! Error taxonomy of the data pipeline.
//!
//! Every failure is fatal to the operation that raised it; nothing in this
//! crate retries. The only recoverable condition is [`UnknownLabelError`],
//! which a caller avoids by switching the label mapping to
//! [`UnknownLabelPolicy::Lenient`](crate::labels::UnknownLabelPolicy::Lenient).

/// Invalid configuration, detected before any data is touched.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("dataset properties declare no features")]
    EmptyFeatures,
    #[display("feature '{name}' is declared more than once")]
    DuplicateFeature { name: String },
    #[display("categorical feature '{name}' is not a declared feature")]
    UnknownCategorical { name: String },
    #[display("feature '{name}' must be exactly one of numeric or categorical")]
    PartitionMismatch { name: String },
    #[display("label column '{name}' is also declared as a feature")]
    LabelIsFeature { name: String },
    #[display("label column '{name}' is declared more than once")]
    DuplicateLabel { name: String },
    #[display("benign label '{value}' is set but no label columns are declared")]
    BenignWithoutLabels { value: String },
    #[display("window size must be positive")]
    ZeroWindowSize,
    #[display("window size {window_size} exceeds dataset length {len}")]
    WindowTooLarge { window_size: usize, len: usize },
    #[display("train fraction {ratio} is outside (0, 1]")]
    InvalidSplitRatio { ratio: f64 },
    #[display("split boundary {boundary} exceeds dataset length {len}")]
    SplitOutOfRange { boundary: usize, len: usize },
    #[display("number of categorical levels must be positive")]
    ZeroCategoricalLevels,
    #[display("noise standard deviation {std_dev} must be finite and non-negative")]
    InvalidNoise { std_dev: f32 },
    #[display("clipping bound {bound} must be positive")]
    InvalidBound { bound: f64 },
    #[display("batch size must be positive")]
    ZeroBatchSize,
    #[display("processor must be fitted before transforming new data")]
    NotFitted,
    #[display("dataset '{name}' is not defined in the catalog")]
    UnknownDataset { name: String },
    #[display("{what} has {actual} entries but the dataset has {expected} rows")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Column lookup or column type failure on a [`DataFrame`](crate::frame::DataFrame).
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum FrameError {
    #[display("column '{name}' not found")]
    MissingColumn { name: String },
    #[display("column '{name}' is not {expected}")]
    ColumnType { name: String, expected: &'static str },
    #[display("column '{name}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[display("row range {start}..{end} is out of bounds for {len} rows")]
    RowRange { start: usize, end: usize, len: usize },
    #[display("data frame operation failed: {message}")]
    Polars { message: String },
}

/// The raw source could not be read or does not match the declared schema.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum LoadError {
    #[display("failed to read {origin}")]
    Csv { origin: String, source: csv::Error },
    #[display("column '{name}' declared in dataset properties is missing from {origin}")]
    MissingColumn { origin: String, name: String },
    #[display("cannot build a table from {origin}")]
    Frame { origin: String, source: FrameError },
    #[display("{origin}, row {row}: cannot parse '{value}' in numeric column '{column}'")]
    ParseNumber {
        origin: String,
        row: usize,
        column: String,
        value: String,
    },
}

/// Failure reported by a single transformation step.
///
/// The pipeline running the step wraps it into a [`TransformationError`] (or a
/// [`StatsMismatchError`] for missing statistics) tagged with the step identity.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum StepError {
    #[display("{_0}")]
    Frame(FrameError),
    #[display("statistic '{key}' is not available")]
    MissingStatistic { key: String },
    #[display("statistic '{key}' has {actual} entries, expected {expected}")]
    StatisticLength {
        key: String,
        expected: usize,
        actual: usize,
    },
    #[display("step is stochastic but no random source was supplied")]
    MissingRandomSource,
    #[display("{message}")]
    Invalid { message: String },
}

impl From<FrameError> for StepError {
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}

impl StepError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// A pipeline step failed; tagged with the step's order and name.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
#[display("transformation step '{name}' (order {order}) failed: {source}")]
pub struct TransformationError {
    pub order: i32,
    pub name: String,
    pub source: StepError,
}

/// A label value outside the fitted mapping was encoded in strict mode.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown value '{value}' in label column '{column}'")]
pub struct UnknownLabelError {
    pub column: String,
    pub value: String,
}

/// Tensor assembly received a window it cannot materialize.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ShapeError {
    #[display("window is empty")]
    EmptyWindow,
    #[display("row index {index} is out of range for {len} rows")]
    IndexOutOfRange { index: usize, len: usize },
    #[display("window has {actual} rows, expected {expected}")]
    WindowLength { expected: usize, actual: usize },
    #[display("step '{name}' returned {actual} rows for a window of {expected}")]
    StepOutput {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[display("window features have shape {actual:?}, expected {expected:?}")]
    FeatureShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[display("{what} rows ({actual}) do not match the numeric rows ({expected})")]
    RowCount {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// The statistics table does not satisfy a configured transformation step.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum StatsMismatchError {
    #[display("step '{step}' requires statistic '{key}'")]
    Missing { step: String, key: String },
    #[display("step '{step}' expects {expected} entries in statistic '{key}', found {actual}")]
    Length {
        step: String,
        key: String,
        expected: usize,
        actual: usize,
    },
}

/// Failure of [`Processor`](crate::processor::Processor) operations.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ProcessError {
    #[display("{_0}")]
    Config(ConfigError),
    #[display("{_0}")]
    Load(LoadError),
    #[display("{_0}")]
    Frame(FrameError),
    #[display("{_0}")]
    UnknownLabel(UnknownLabelError),
    #[display("{_0}")]
    Transformation(TransformationError),
}

/// Failure of tensor assembly in [`TabularModeling`](crate::modeling::TabularModeling).
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ModelingError {
    #[display("{_0}")]
    Shape(ShapeError),
    #[display("{_0}")]
    StatsMismatch(StatsMismatchError),
    #[display("{_0}")]
    Transformation(TransformationError),
}

/// Any failure of this crate.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum Error {
    #[display("{_0}")]
    Config(ConfigError),
    #[display("{_0}")]
    Frame(FrameError),
    #[display("{_0}")]
    Process(ProcessError),
    #[display("{_0}")]
    Modeling(ModelingError),
}
