use std::path::{Path, PathBuf};

use anyhow::Context;
use tabseq_data::processor::{
    BalanceConfig, DEFAULT_BALANCE_CONTEXT, DEFAULT_BALANCE_PER_CLASS, balance_mask,
};
use tabseq_stats::frequency::ValueCounts;

use super::split;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct BalanceArg {
    /// Input CSV file (with header row)
    #[arg(long)]
    input: PathBuf,
    /// Output CSV file
    #[arg(long)]
    output: PathBuf,
    /// Column holding the class label
    #[arg(long)]
    label_column: String,
    /// Label value of the benign class
    #[arg(long)]
    benign: String,
    /// Leading rows kept for every anomalous class
    #[arg(long, default_value_t = DEFAULT_BALANCE_PER_CLASS)]
    per_class: usize,
    /// Benign rows kept on each side of a selected anomalous row
    #[arg(long, default_value_t = DEFAULT_BALANCE_CONTEXT)]
    context: usize,
}

pub(crate) fn run(arg: &BalanceArg) -> anyhow::Result<()> {
    let config = BalanceConfig {
        per_class: arg.per_class,
        context: arg.context,
    };
    let counts = balance_file(&arg.input, &arg.output, &arg.label_column, &arg.benign, config)?;

    println!(
        "Kept {} rows -> {}",
        counts.total(),
        arg.output.display()
    );
    for (label, count) in counts.iter() {
        println!("  {label:<24} {count:>8}");
    }
    Ok(())
}

/// Writes the balanced selection of `input` to `output` and counts the kept labels.
fn balance_file(
    input: &Path,
    output: &Path,
    label_column: &str,
    benign: &str,
    config: BalanceConfig,
) -> anyhow::Result<ValueCounts<String>> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("Failed to open input file: {}", input.display()))?;
    let headers = reader
        .byte_headers()
        .with_context(|| format!("Failed to read header of {}", input.display()))?
        .clone();
    let column = headers
        .iter()
        .position(|name| name == label_column.as_bytes())
        .with_context(|| format!("Column '{label_column}' not found in {}", input.display()))?;
    let records = reader
        .byte_records()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read records of {}", input.display()))?;

    let labels = records
        .iter()
        .map(|record| String::from_utf8_lossy(record.get(column).unwrap_or_default()))
        .collect::<Vec<_>>();
    let keep = balance_mask(&labels, benign, config);

    let mut counts = ValueCounts::default();
    let mut selected = Vec::new();
    for ((record, label), keep) in records.iter().zip(&labels).zip(keep) {
        if keep {
            counts.add(label.clone().into_owned());
            selected.push(record.clone());
        }
    }
    split::write_records(output, &headers, &selected)?;
    Ok(counts)
}
