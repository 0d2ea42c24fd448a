//! Whole-dataset preparation.
//!
//! The [`Processor`] is the first stage of the pipeline:
//!
//! 1. load the raw table from its [`DataSource`]
//! 2. replace raw label values by dense codes ([`LabelEncoding`]), if enabled
//! 3. run the registered [`PreTransformation`] steps in ascending order
//! 4. split the result into train and test partitions, preserving row order
//!
//! The label encoding learned by [`Processor::fit`] is kept so that
//! [`Processor::transform`] can prepare inference data with exactly the same
//! encoding and steps.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, FrameError, ProcessError, TransformationError},
    frame::{DataFrame, FrameExt},
    labels::{LabelEncoding, UnknownLabelPolicy},
    properties::DatasetProperties,
    source::DataSource,
    step::OrderedSteps,
    transform::{BoxedPreTransformation, PreTransformation},
};

/// Fraction of rows used for training when nothing else is configured.
pub const DEFAULT_TRAIN_RATIO: f64 = 0.7;

/// How the processed table is cut into train and test partitions.
///
/// Both strategies cut once: train is a prefix, test the remaining suffix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Train fraction in `(0, 1]`; train size is `floor(len * ratio)`.
    Ratio(f64),
    /// Number of leading rows assigned to train.
    Boundary(usize),
}

impl Default for SplitStrategy {
    fn default() -> Self {
        Self::Ratio(DEFAULT_TRAIN_RATIO)
    }
}

impl SplitStrategy {
    /// Checks the parts of the strategy that do not depend on the data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Ratio(ratio) if !(ratio > 0.0 && ratio <= 1.0) => {
                Err(ConfigError::InvalidSplitRatio { ratio })
            }
            _ => Ok(()),
        }
    }

    /// Number of train rows for a table of `len` rows.
    ///
    /// ```
    /// use tabseq_data::processor::SplitStrategy;
    ///
    /// assert_eq!(SplitStrategy::Ratio(0.7).split_point(10)?, 7);
    /// assert_eq!(SplitStrategy::Boundary(4).split_point(10)?, 4);
    /// assert!(SplitStrategy::Boundary(11).split_point(10).is_err());
    /// # Ok::<(), tabseq_data::error::ConfigError>(())
    /// ```
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn split_point(&self, len: usize) -> Result<usize, ConfigError> {
        self.validate()?;
        match *self {
            Self::Ratio(ratio) => Ok(((len as f64) * ratio).floor() as usize),
            Self::Boundary(boundary) if boundary > len => {
                Err(ConfigError::SplitOutOfRange { boundary, len })
            }
            Self::Boundary(boundary) => Ok(boundary),
        }
    }
}

/// Splits `frame` into `(train, test)` according to `strategy`.
pub fn split_frame(
    frame: &DataFrame,
    strategy: SplitStrategy,
) -> Result<(DataFrame, DataFrame), ProcessError> {
    let point = strategy.split_point(frame.height())?;
    Ok(frame.split_rows(point)?)
}

/// Rows kept per anomalous class by default when balancing.
pub const DEFAULT_BALANCE_PER_CLASS: usize = 200;

/// Benign rows kept on each side of a selected anomalous row by default.
pub const DEFAULT_BALANCE_CONTEXT: usize = 2;

/// Selection knobs of [`balance_mask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BalanceConfig {
    /// Leading rows kept for every non-benign label value.
    pub per_class: usize,
    /// Benign neighbours kept before and after each selected row.
    pub context: usize,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            per_class: DEFAULT_BALANCE_PER_CLASS,
            context: DEFAULT_BALANCE_CONTEXT,
        }
    }
}

/// Selects the rows of a balanced evaluation table.
///
/// For every label value other than `benign`, the first `per_class` rows
/// carrying it are kept, together with the benign rows among the `context`
/// rows on either side of each of them. Non-benign neighbours are only kept
/// when selected in their own right. Kept rows stay in their original order.
///
/// ```
/// use tabseq_data::processor::{BalanceConfig, balance_mask};
///
/// let labels = ["ok", "ok", "dos", "ok", "ok", "ok", "scan", "dos", "ok"];
/// let config = BalanceConfig { per_class: 1, context: 1 };
/// let keep = balance_mask(&labels, "ok", config);
/// let rows = (0..labels.len()).filter(|&row| keep[row]).collect::<Vec<_>>();
/// assert_eq!(rows, [1, 2, 3, 5, 6]);
/// ```
#[must_use]
pub fn balance_mask<S>(labels: &[S], benign: &str, config: BalanceConfig) -> Vec<bool>
where
    S: AsRef<str>,
{
    let is_benign = |row: usize| labels[row].as_ref() == benign;
    let mut taken = HashMap::<&str, usize>::new();
    let mut keep = vec![false; labels.len()];
    for (row, label) in labels.iter().enumerate() {
        let label = label.as_ref();
        if label == benign {
            continue;
        }
        let count = taken.entry(label).or_default();
        if *count >= config.per_class {
            continue;
        }
        *count += 1;
        keep[row] = true;
        let first = row.saturating_sub(config.context);
        let last = (row + config.context).min(labels.len() - 1);
        for neighbour in first..=last {
            if is_benign(neighbour) {
                keep[neighbour] = true;
            }
        }
    }
    keep
}

/// Keeps the rows of `frame` selected by [`balance_mask`] on `label_column`.
pub fn balance_frame(
    frame: &DataFrame,
    label_column: &str,
    benign: &str,
    config: BalanceConfig,
) -> Result<DataFrame, FrameError> {
    let labels = frame.strings(label_column)?;
    let keep = balance_mask(&labels, benign, config);
    let balanced = frame.filter_rows(&keep)?;
    log::info!(
        "balanced '{label_column}': kept {} of {} rows",
        balanced.height(),
        frame.height()
    );
    Ok(balanced)
}

/// Processor knobs that do not depend on the dataset schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Replace raw label values by dense codes before the pre-steps run.
    pub convert_labels: bool,
    pub split: SplitStrategy,
    /// Handling of label values the fitted mapping has never seen.
    pub label_policy: UnknownLabelPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            convert_labels: true,
            split: SplitStrategy::default(),
            label_policy: UnknownLabelPolicy::default(),
        }
    }
}

/// Loads, encodes, transforms and splits a raw table.
///
/// ```
/// use tabseq_data::{
///     frame::FrameExt as _,
///     processor::{Processor, ProcessorConfig, SplitStrategy},
///     properties::DatasetProperties,
///     transform::pre_fn,
/// };
///
/// let props = DatasetProperties::new(["x"], Vec::<String>::new(), ["y"], Some("ok"))?;
/// let raw = polars::df!(
///     "x" => [1.0, 2.0, 3.0, 4.0],
///     "y" => ["ok", "bad", "ok", "ok"]
/// )?;
/// let config = ProcessorConfig {
///     split: SplitStrategy::Boundary(3),
///     ..ProcessorConfig::default()
/// };
/// let mut processor = Processor::new(raw, props, config)?;
/// processor.add_step(
///     pre_fn("double", |frame, _| Ok(frame.map_numeric("x", |v| v * 2.0)?)),
///     1,
/// );
/// let (train, test) = processor.fit()?;
/// assert_eq!(train.numeric("x")?, [2.0, 4.0, 6.0]);
/// assert_eq!(train.numeric("y")?, [0.0, 1.0, 0.0]);
/// assert_eq!(test.height(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Processor<S> {
    source: S,
    properties: DatasetProperties,
    config: ProcessorConfig,
    steps: OrderedSteps<BoxedPreTransformation>,
    labels: Option<Arc<LabelEncoding>>,
    fitted: bool,
}

impl<S> Processor<S>
where
    S: DataSource,
{
    /// Creates a processor, validating the configuration before any data is read.
    pub fn new(
        source: S,
        properties: DatasetProperties,
        config: ProcessorConfig,
    ) -> Result<Self, ConfigError> {
        config.split.validate()?;
        Ok(Self {
            source,
            properties,
            config,
            steps: OrderedSteps::new(),
            labels: None,
            fitted: false,
        })
    }

    /// Registers a pre-transformation.
    ///
    /// Steps run in ascending `order`; equal orders run in registration
    /// order. Frames returned by an earlier [`fit`](Self::fit) are not
    /// affected.
    pub fn add_step<T>(&mut self, step: T, order: i32) -> &mut Self
    where
        T: PreTransformation + 'static,
    {
        self.steps.push(Box::new(step), order);
        self
    }

    #[must_use]
    pub fn properties(&self) -> &DatasetProperties {
        &self.properties
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    /// Label encoding learned by the last [`fit`](Self::fit), if labels were converted.
    #[must_use]
    pub fn label_encoding(&self) -> Option<&Arc<LabelEncoding>> {
        self.labels.as_ref()
    }

    /// Runs the whole preparation and returns `(train, test)`.
    pub fn fit(&mut self) -> Result<(DataFrame, DataFrame), ProcessError> {
        let mut frame = self.source.load(&self.properties)?;
        log::info!(
            "loaded {} rows x {} columns from {}",
            frame.height(),
            frame.width(),
            self.source.describe()
        );

        self.labels = None;
        if self.config.convert_labels && self.properties.is_supervised() {
            let encoding = LabelEncoding::fit(
                &frame,
                self.properties.labels(),
                self.properties.benign_label(),
                self.config.label_policy,
            )?;
            encoding.encode_frame(&mut frame)?;
            for mapping in encoding.iter() {
                log::info!(
                    "label column '{}': {} classes {:?}",
                    mapping.column(),
                    mapping.len(),
                    mapping.classes()
                );
            }
            self.labels = Some(Arc::new(encoding));
        }

        self.run_steps(&mut frame)?;
        let (train, test) = split_frame(&frame, self.config.split)?;
        log::info!(
            "split {} rows into {} train / {} test",
            frame.height(),
            train.height(),
            test.height()
        );
        self.fitted = true;
        Ok((train, test))
    }

    /// Prepares new data with the fitted label encoding and the registered steps.
    ///
    /// The frame is not split. Label columns may be absent (unlabeled
    /// inference data); present ones are encoded under the configured
    /// unknown-label policy.
    pub fn transform(&self, frame: DataFrame) -> Result<DataFrame, ProcessError> {
        if !self.fitted {
            return Err(ConfigError::NotFitted.into());
        }
        if let Some(name) = self
            .properties
            .features()
            .iter()
            .find(|name| !frame.has_column(name))
        {
            return Err(FrameError::MissingColumn { name: name.clone() }.into());
        }
        let mut frame = frame;
        if let Some(labels) = &self.labels {
            labels.encode_frame(&mut frame)?;
        }
        self.run_steps(&mut frame)?;
        Ok(frame)
    }

    fn run_steps(&self, frame: &mut DataFrame) -> Result<(), TransformationError> {
        for registered in self.steps.iter() {
            let name = registered.step.name();
            log::debug!("applying pre-transformation '{name}' (order {})", registered.order);
            registered
                .step
                .apply(frame, &self.properties)
                .map_err(|source| TransformationError {
                    order: registered.order,
                    name: name.to_owned(),
                    source,
                })?;
        }
        if !self.steps.is_empty() {
            log::info!(
                "applied {} pre-transformations, {} rows remain",
                self.steps.len(),
                frame.height()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write as _,
        sync::{Mutex, OnceLock},
    };

    use super::*;
    use crate::{
        error::StepError,
        source::CsvSource,
        transform::{FnPreTransformation, pre_fn},
    };

    type PreFn = fn(&mut DataFrame, &DatasetProperties) -> Result<(), StepError>;

    fn props() -> DatasetProperties {
        DatasetProperties::new(["x"], Vec::<String>::new(), ["y"], Some("ok")).unwrap()
    }

    fn raw() -> DataFrame {
        polars::df!(
            "x" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "y" => ["ok", "bad", "ok", "worse", "ok"]
        )
        .unwrap()
    }

    fn add_one(frame: &mut DataFrame, _: &DatasetProperties) -> Result<(), StepError> {
        Ok(frame.map_numeric("x", |v| v + 1.0)?)
    }

    fn triple(frame: &mut DataFrame, _: &DatasetProperties) -> Result<(), StepError> {
        Ok(frame.map_numeric("x", |v| v * 3.0)?)
    }

    fn drop_big(frame: &mut DataFrame, _: &DatasetProperties) -> Result<(), StepError> {
        let keep = frame
            .numeric("x")?
            .iter()
            .map(|v| *v < 16.0)
            .collect::<Vec<_>>();
        *frame = frame.filter_rows(&keep)?;
        Ok(())
    }

    // non-commuting steps: any reordering changes the result
    fn numbered_steps() -> [(i32, FnPreTransformation<PreFn>); 3] {
        [
            (1, pre_fn("add", add_one as PreFn)),
            (2, pre_fn("triple", triple as PreFn)),
            (3, pre_fn("drop_big", drop_big as PreFn)),
        ]
    }

    fn boundary(rows: usize) -> ProcessorConfig {
        ProcessorConfig {
            split: SplitStrategy::Boundary(rows),
            ..ProcessorConfig::default()
        }
    }

    #[test]
    fn test_step_order_independent_of_registration() {
        let run = |permutation: [usize; 3]| {
            let mut steps = numbered_steps().map(Some);
            let mut processor = Processor::new(raw(), props(), boundary(2)).unwrap();
            for idx in permutation {
                let (order, step) = steps[idx].take().unwrap();
                processor.add_step(step, order);
            }
            let (train, test) = processor.fit().unwrap();
            (train.numeric("x").unwrap(), test.numeric("x").unwrap())
        };
        let sorted = run([0, 1, 2]);
        let shuffled = run([2, 0, 1]);
        assert_eq!(sorted, shuffled);
        // (x + 1) * 3 < 16 keeps x in {1, 2, 3, 4}
        assert_eq!(sorted.0, [6.0, 9.0]);
        assert_eq!(sorted.1, [12.0, 15.0]);
    }

    #[test]
    fn test_equal_orders_keep_registration_order() {
        let mut processor = Processor::new(raw(), props(), boundary(5)).unwrap();
        processor
            .add_step(
                pre_fn("set", |f, _| Ok(f.map_numeric("x", |_| 1.0)?)),
                0,
            )
            .add_step(
                pre_fn("add", |f, _| Ok(f.map_numeric("x", |v| v + 1.0)?)),
                0,
            );
        let (train, _) = processor.fit().unwrap();
        assert!(train.numeric("x").unwrap().iter().all(|v| *v == 2.0));
    }

    #[test]
    fn test_late_registration_does_not_affect_prior_fit() {
        let mut processor = Processor::new(raw(), props(), boundary(5)).unwrap();
        let (before, _) = processor.fit().unwrap();
        processor.add_step(
            pre_fn("zero", |f, _| Ok(f.map_numeric("x", |_| 0.0)?)),
            0,
        );
        assert_eq!(before.numeric("x").unwrap(), [1.0, 2.0, 3.0, 4.0, 5.0]);
        let (after, _) = processor.fit().unwrap();
        assert_eq!(after.numeric("x").unwrap(), [0.0; 5]);
    }

    #[test]
    fn test_label_conversion_reserves_benign() {
        let mut processor = Processor::new(raw(), props(), boundary(5)).unwrap();
        let (train, _) = processor.fit().unwrap();
        assert_eq!(train.numeric("y").unwrap(), [0.0, 1.0, 0.0, 2.0, 0.0]);
        let mapping = processor.label_encoding().unwrap().get("y").unwrap();
        assert_eq!(mapping.classes(), ["ok", "bad", "worse"]);
    }

    #[test]
    fn test_step_failure_is_tagged() {
        let mut processor = Processor::new(raw(), props(), boundary(5)).unwrap();
        processor.add_step(pre_fn("missing", |f, _| Ok(f.numeric("nope").map(|_| ())?)), 9);
        let err = processor.fit().unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Transformation(TransformationError { order: 9, ref name, .. })
                if name == "missing"
        ));
    }

    #[test]
    fn test_transform_reuses_encoding() {
        let config = ProcessorConfig {
            label_policy: UnknownLabelPolicy::Strict,
            ..boundary(5)
        };
        let mut processor = Processor::new(raw(), props(), config).unwrap();
        assert!(matches!(
            processor.transform(raw()),
            Err(ProcessError::Config(ConfigError::NotFitted))
        ));
        processor.fit().unwrap();

        let unseen = polars::df!("x" => [1.0], "y" => ["new"]).unwrap();
        assert!(matches!(
            processor.transform(unseen),
            Err(ProcessError::UnknownLabel(_))
        ));

        let unlabeled = polars::df!("x" => [7.0]).unwrap();
        let out = processor.transform(unlabeled).unwrap();
        assert_eq!(out.numeric("x").unwrap(), [7.0]);
    }

    #[test]
    fn test_split_validation() {
        assert_eq!(
            SplitStrategy::Ratio(0.0).validate(),
            Err(ConfigError::InvalidSplitRatio { ratio: 0.0 })
        );
        assert!(SplitStrategy::Ratio(1.0).validate().is_ok());
        assert!(Processor::new(raw(), props(), ProcessorConfig {
            split: SplitStrategy::Ratio(1.5),
            ..ProcessorConfig::default()
        })
        .is_err());
        let mut processor = Processor::new(raw(), props(), boundary(6)).unwrap();
        assert!(matches!(
            processor.fit(),
            Err(ProcessError::Config(ConfigError::SplitOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_balance_frame_keeps_context_in_row_order() {
        let frame = polars::df!(
            "x" => [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
            "y" => ["dos", "ok", "ok", "dos", "dos", "ok", "ok", "ok"]
        )
        .unwrap();
        let config = BalanceConfig {
            per_class: 2,
            context: 2,
        };
        let balanced = balance_frame(&frame, "y", "ok", config).unwrap();
        // rows 0 and 3 are the first two "dos" rows; row 4 is a third one
        assert_eq!(balanced.numeric("x").unwrap(), [0.0, 1.0, 2.0, 3.0, 5.0]);

        let unlimited = BalanceConfig {
            per_class: 10,
            context: 0,
        };
        let attacks = balance_frame(&frame, "y", "ok", unlimited).unwrap();
        assert_eq!(attacks.numeric("x").unwrap(), [0.0, 3.0, 4.0]);
        assert!(balance_frame(&frame, "nope", "ok", config).is_err());
    }

    #[test]
    fn test_balance_mask_without_anomalies() {
        assert_eq!(
            balance_mask(&["ok", "ok"], "ok", BalanceConfig::default()),
            [false, false]
        );
        assert!(balance_mask::<&str>(&[], "ok", BalanceConfig::default()).is_empty());
    }

    struct CapturedLog(Mutex<Vec<(log::Level, String)>>);

    impl log::Log for CapturedLog {
        fn enabled(&self, _: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            self.0
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    fn captured_log() -> &'static CapturedLog {
        static LOGGER: OnceLock<CapturedLog> = OnceLock::new();
        let logger = LOGGER.get_or_init(|| CapturedLog(Mutex::new(Vec::new())));
        if log::set_logger(logger).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
        logger
    }

    #[test]
    fn test_csv_load_logged_once_at_info() {
        let logger = captured_log();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x,y\n1,ok\n2,bad\n3,ok").unwrap();
        file.flush().unwrap();
        let source = CsvSource::new(file.path());
        let origin = source.describe();

        let mut processor = Processor::new(source, props(), boundary(2)).unwrap();
        processor.fit().unwrap();

        let records = logger.0.lock().unwrap();
        let mentions = |level| {
            records
                .iter()
                .filter(|(l, message)| *l == level && message.contains(&origin))
                .count()
        };
        assert_eq!(mentions(log::Level::Info), 1);
        assert_eq!(mentions(log::Level::Debug), 1);
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: ProcessorConfig =
            serde_json::from_str(r#"{ "split": { "boundary": 10 } }"#).unwrap();
        assert!(config.convert_labels);
        assert_eq!(config.split, SplitStrategy::Boundary(10));
        assert_eq!(config.label_policy, UnknownLabelPolicy::Lenient);
    }
}
