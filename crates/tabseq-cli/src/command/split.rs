use std::path::{Path, PathBuf};

use anyhow::Context;
use tabseq_data::processor::{DEFAULT_TRAIN_RATIO, SplitStrategy};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SplitArg {
    /// Input CSV file (with header row)
    #[arg(long)]
    input: PathBuf,
    /// Fraction of leading rows written to the train file
    #[arg(long, default_value_t = DEFAULT_TRAIN_RATIO)]
    train_fraction: f64,
    /// Train output CSV file
    #[arg(long)]
    train_output: PathBuf,
    /// Test output CSV file
    #[arg(long)]
    test_output: PathBuf,
}

pub(crate) fn run(arg: &SplitArg) -> anyhow::Result<()> {
    let SplitArg {
        input,
        train_fraction,
        train_output,
        test_output,
    } = arg;

    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("Failed to open input file: {}", input.display()))?;
    let headers = reader
        .byte_headers()
        .with_context(|| format!("Failed to read header of {}", input.display()))?
        .clone();
    let records = reader
        .byte_records()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read records of {}", input.display()))?;

    let split = SplitStrategy::Ratio(*train_fraction).split_point(records.len())?;
    let (train, test) = records.split_at(split);
    write_records(train_output, &headers, train)?;
    write_records(test_output, &headers, test)?;

    println!(
        "Split {} rows: {} train -> {}, {} test -> {}",
        records.len(),
        train.len(),
        train_output.display(),
        test.len(),
        test_output.display()
    );
    Ok(())
}

pub(crate) fn write_records(
    path: &Path,
    headers: &csv::ByteRecord,
    records: &[csv::ByteRecord],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    writer
        .write_byte_record(headers)
        .and_then(|()| {
            records
                .iter()
                .try_for_each(|record| writer.write_byte_record(record))
        })
        .with_context(|| format!("Failed to write records to {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush output to {}", path.display()))?;
    log::info!("wrote {} rows to {}", records.len(), path.display());
    Ok(())
}
