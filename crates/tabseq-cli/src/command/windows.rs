use anyhow::Context;
use rand::{SeedableRng, rngs::StdRng};
use tabseq_data::{
    batch::WindowBatches,
    dataset::TabularDataset,
    frame::DataFrame,
    modeling::TabularModeling,
    pipeline::TransformationBuilder,
    postprocessing::{OneHot, Standardize},
    sampler::{GroupWindowSampler, RandomSlidingWindowSampler, Window, WindowSampler},
};

use super::prepare::{self, DataArg};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct WindowsArg {
    #[clap(flatten)]
    data: DataArg,
    /// Number of consecutive rows per window
    #[arg(long, default_value_t = 8)]
    window_size: usize,
    /// Number of windows per batch
    #[arg(long, default_value_t = 64)]
    batch_size: usize,
    /// Number of batches to draw
    #[arg(long, default_value_t = 3)]
    count: usize,
    /// Column whose values delimit groups; windows never span two groups
    #[arg(long)]
    group_column: Option<String>,
    /// Random seed for the window order
    #[arg(long)]
    seed: Option<u64>,
}

pub(crate) fn run(arg: &WindowsArg) -> anyhow::Result<()> {
    let prepared = prepare::prepare(&arg.data)?;
    let properties = &prepared.properties;
    let stats = &prepared.stats;

    let mut numeric = TransformationBuilder::new();
    numeric.add_step(Standardize, 1);
    let mut categorical = TransformationBuilder::new();
    categorical.add_step(OneHot::new(arg.data.categorical_levels), 1);

    let build = |frame: &DataFrame, split: &str| -> anyhow::Result<TabularDataset> {
        let mut modeling = TabularModeling::from_frame(frame, properties)
            .with_context(|| format!("Failed to build {split} tensors"))?;
        modeling.set_numeric_transformation(numeric.build());
        modeling.set_categorical_transformation(categorical.build());
        TabularDataset::new(modeling, stats.clone(), arg.window_size)
            .with_context(|| format!("Failed to build {split} dataset"))
    };
    let train_dataset = build(&prepared.train, "train")?;
    match build(&prepared.test, "test") {
        Ok(test_dataset) => println!(
            "Test dataset: {} rows, {} windows",
            test_dataset.num_rows(),
            test_dataset.len()
        ),
        Err(err) => log::warn!("{err:#}"),
    }
    println!(
        "Train dataset: {} rows, {} windows of {} rows",
        train_dataset.num_rows(),
        train_dataset.len(),
        arg.window_size
    );

    let seed = arg.seed.unwrap_or_else(rand::random);
    log::info!("window order seed: {seed}");
    let mut rng = StdRng::seed_from_u64(seed);
    let wanted = arg.count * arg.batch_size;
    let windows: Vec<Window> = match &arg.group_column {
        Some(column) => {
            let keys = prepared.train_group_keys(column)?;
            let sampler = GroupWindowSampler::new(&train_dataset, &keys, arg.window_size)?;
            println!(
                "Sampler: {} groups, {} windows",
                sampler.num_groups(),
                sampler.len()
            );
            sampler.iter_with_rng(&mut rng).take(wanted).collect()
        }
        None => {
            let sampler = RandomSlidingWindowSampler::new(&train_dataset, arg.window_size)?;
            println!("Sampler: {} windows", sampler.len());
            sampler.iter_with_rng(&mut rng).take(wanted).collect()
        }
    };

    let batches = WindowBatches::new(&train_dataset, windows, arg.batch_size)?
        .drop_last(true)
        .with_rng(&mut rng);
    for (idx, batch) in batches.enumerate() {
        let batch = batch.with_context(|| format!("Failed to assemble batch {idx}"))?;
        let anomalous = batch
            .targets
            .as_ref()
            .map(|targets| targets.iter().filter(|t| **t != 0.0).count());
        match anomalous {
            Some(anomalous) => println!(
                "Batch {idx}: features {:?}, {anomalous} of {} targets non-benign",
                batch.features.dim(),
                batch.len()
            ),
            None => println!("Batch {idx}: features {:?}", batch.features.dim()),
        }
    }
    Ok(())
}
