use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use tabseq_data::{
    frame::{DataFrame, FrameExt as _},
    labels::{LabelEncoding, UnknownLabelPolicy},
    preprocessing::{
        BaseCleanup, BinarizeLabels, CategoricalLevels, DEFAULT_BOUND, DEFAULT_CATEGORICAL_LEVELS,
        LogScale,
    },
    processor::{DEFAULT_TRAIN_RATIO, Processor, ProcessorConfig, SplitStrategy},
    properties::DatasetProperties,
    sampler::group_keys,
    source::{CsvSource, DataSource as _},
    statistics::Statistics,
    transform::PreTransformation as _,
};
use tabseq_stats::frequency::ValueCounts;

use crate::util;

/// Options shared by every command that prepares a dataset.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct DataArg {
    /// Dataset catalog JSON file
    #[arg(long)]
    catalog: PathBuf,
    /// Name of the dataset in the catalog
    #[arg(long)]
    dataset: String,
    /// Raw CSV file
    #[arg(long)]
    input: PathBuf,
    /// Fraction of leading rows used for training
    #[arg(long, default_value_t = DEFAULT_TRAIN_RATIO)]
    train_fraction: f64,
    /// Numeric features are clipped to [-bound, bound]
    #[arg(long, default_value_t = DEFAULT_BOUND)]
    bound: f64,
    /// Number of categorical levels, including the shared "other" level
    #[arg(long, default_value_t = DEFAULT_CATEGORICAL_LEVELS)]
    pub(crate) categorical_levels: usize,
    /// Collapse labels to benign (0) / anomalous (1)
    #[arg(long)]
    binary_labels: bool,
    /// Fail on label values that were not seen while fitting
    #[arg(long)]
    strict_labels: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PrepareArg {
    #[clap(flatten)]
    data: DataArg,
}

/// Output of the preparation pipeline.
#[derive(Debug)]
pub(crate) struct PreparedData {
    pub(crate) properties: DatasetProperties,
    /// Raw training rows, before any pre-transformation.
    pub(crate) raw_train: DataFrame,
    pub(crate) train: DataFrame,
    pub(crate) test: DataFrame,
    pub(crate) labels: Option<Arc<LabelEncoding>>,
    pub(crate) stats: Arc<Statistics>,
}

impl PreparedData {
    /// Group keys of the training rows, read from the raw table.
    ///
    /// The processed frame cannot be used: categorical pre-steps fold rare
    /// values into one shared code, which would merge unrelated groups.
    pub(crate) fn train_group_keys(&self, column: &str) -> anyhow::Result<Vec<String>> {
        group_keys(&self.raw_train, column)
            .with_context(|| format!("Failed to read group column '{column}'"))
    }
}

pub(crate) fn prepare(arg: &DataArg) -> anyhow::Result<PreparedData> {
    let properties = util::read_dataset_properties(&arg.catalog, &arg.dataset)?;
    let source = CsvSource::new(&arg.input);
    let raw = source
        .load(&properties)
        .with_context(|| format!("Failed to load dataset '{}'", arg.dataset))?;
    prepare_frame(arg, properties, raw)
}

fn prepare_frame(
    arg: &DataArg,
    properties: DatasetProperties,
    raw: DataFrame,
) -> anyhow::Result<PreparedData> {
    let split = SplitStrategy::Ratio(arg.train_fraction);
    let cleanup = BaseCleanup::new(arg.bound)?;

    // scaling ranges and category levels come from the training rows only
    let raw_train = raw.slice_rows(0..split.split_point(raw.height())?)?;
    let mut train_preview = raw_train.clone();
    cleanup.apply(&mut train_preview, &properties)?;
    let log_scale = LogScale::fit(&train_preview, &properties)?;
    let levels = CategoricalLevels::fit(&train_preview, &properties, arg.categorical_levels)?;

    let config = ProcessorConfig {
        convert_labels: true,
        split,
        label_policy: if arg.strict_labels {
            UnknownLabelPolicy::Strict
        } else {
            UnknownLabelPolicy::Lenient
        },
    };
    let mut processor = Processor::new(raw, properties.clone(), config)?;
    processor
        .add_step(cleanup, 1)
        .add_step(log_scale, 2)
        .add_step(levels, 3);
    if arg.binary_labels {
        processor.add_step(BinarizeLabels, 4);
    }
    let (train, test) = processor
        .fit()
        .with_context(|| format!("Failed to prepare dataset '{}'", arg.dataset))?;
    let stats = Statistics::from_training(&train, &properties)?;

    Ok(PreparedData {
        labels: processor.label_encoding().cloned(),
        properties,
        raw_train,
        train,
        test,
        stats: Arc::new(stats),
    })
}

pub(crate) fn run(arg: &PrepareArg) -> anyhow::Result<()> {
    let PreparedData {
        properties,
        train,
        test,
        labels,
        stats,
        ..
    } = prepare(&arg.data)?;

    println!("Rows: {} train, {} test", train.height(), test.height());
    println!(
        "Features: {} numeric, {} categorical",
        properties.numeric_features().len(),
        properties.categorical_features().len()
    );

    if let Some(labels) = &labels {
        for mapping in labels.iter() {
            println!("Label column '{}':", mapping.column());
            for (code, class) in mapping.classes().iter().enumerate() {
                let marker = if mapping.is_benign(code) { " (benign)" } else { "" };
                println!("  {code:>3}: {class}{marker}");
            }
        }
    }

    println!("Statistics (train split):");
    for (key, values) in stats.iter() {
        let names = if key == tabseq_data::statistics::CARDINALITY {
            properties.categorical_features()
        } else {
            properties.numeric_features()
        };
        for (name, value) in names.iter().zip(values) {
            println!("  {key:<11} {name:<24} {value:>12.4}");
        }
    }

    if let Some(target) = properties.labels().last() {
        print_class_weights(&train, target)?;
    }
    Ok(())
}

#[expect(clippy::cast_possible_truncation)]
fn print_class_weights(train: &DataFrame, target: &str) -> anyhow::Result<()> {
    let codes = train
        .numeric(target)
        .with_context(|| format!("Label column '{target}' is not encoded"))?;
    let counts = ValueCounts::new(codes.iter().map(|code| *code as i64));
    println!("Class weights ('{target}', train split):");
    for (class, weight) in counts.class_weights() {
        println!("  {class:>3}: {weight:.4} ({} rows)", counts.get(&class));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tabseq_data::{frame::FrameExt as _, source::read_csv_from};

    use super::*;

    fn arg(categorical_levels: usize) -> DataArg {
        DataArg {
            catalog: PathBuf::new(),
            dataset: "sessions".into(),
            input: PathBuf::new(),
            train_fraction: 0.75,
            bound: DEFAULT_BOUND,
            categorical_levels,
            binary_labels: false,
            strict_labels: false,
        }
    }

    #[test]
    fn test_group_keys_survive_categorical_folding() {
        let properties =
            DatasetProperties::new(["bytes", "session"], ["session"], ["label"], Some("ok")).unwrap();
        let csv = "bytes,session,label\n1,s1,ok\n2,s1,ok\n3,s1,bad\n4,s2,ok\n\
                   5,s3,ok\n6,s3,ok\n7,s4,bad\n8,s5,ok\n";
        let raw = read_csv_from(csv.as_bytes(), "inline", &properties).unwrap();
        let prepared = prepare_frame(&arg(2), properties, raw).unwrap();

        // two levels: the most frequent session keeps code 0, the rest share 1
        let folded = prepared.train.strings("session").unwrap();
        assert_eq!(folded, ["0", "0", "0", "1", "1", "1"]);

        let keys = prepared.train_group_keys("session").unwrap();
        assert_eq!(keys, ["s1", "s1", "s1", "s2", "s3", "s3"]);
        assert_eq!(keys.len(), prepared.train.height());
        assert!(prepared.train_group_keys("missing").is_err());
    }
}
