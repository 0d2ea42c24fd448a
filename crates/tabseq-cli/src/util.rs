use std::{fs::File, io, path::Path};

use anyhow::Context;
use tabseq_data::properties::{DatasetCatalog, DatasetProperties};

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

/// Reads a dataset catalog and selects one dataset's properties by name.
pub fn read_dataset_properties<P>(path: P, name: &str) -> anyhow::Result<DatasetProperties>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let catalog: DatasetCatalog = read_json_file("dataset catalog", path)?;
    let properties = catalog
        .get(name)
        .with_context(|| format!("Failed to select dataset from {}", path.display()))?;
    Ok(properties.clone())
}
