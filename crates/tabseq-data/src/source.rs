//! Raw tabular sources.
//!
//! A [`DataSource`] turns some external table into a [`DataFrame`] that
//! satisfies a [`DatasetProperties`] schema. [`CsvSource`] reads delimited
//! files; a [`DataFrame`] is itself a source (an in-memory copy), which is how
//! already-loaded inference data is fed through a fitted
//! [`Processor`](crate::processor::Processor).

use std::{
    io,
    path::{Path, PathBuf},
};

use polars::prelude::Column;

use crate::{
    error::LoadError,
    frame::{DataFrame, FrameExt},
    properties::DatasetProperties,
};

/// Loads a raw table into memory.
pub trait DataSource {
    /// Human readable origin used in log and error messages.
    fn describe(&self) -> String;

    /// Loads the table, failing if any column required by `properties` is absent.
    fn load(&self, properties: &DatasetProperties) -> Result<DataFrame, LoadError>;
}

impl DataSource for DataFrame {
    fn describe(&self) -> String {
        format!("in-memory frame ({} rows)", self.height())
    }

    fn load(&self, properties: &DatasetProperties) -> Result<DataFrame, LoadError> {
        check_required_columns(self, properties, &self.describe())?;
        Ok(self.clone())
    }
}

/// CSV file with a header row.
///
/// Declared numeric features are parsed as `f64` (an empty cell becomes NaN);
/// every other column is kept as text.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self, properties: &DatasetProperties) -> Result<DataFrame, LoadError> {
        let origin = self.describe();
        let reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|source| LoadError::Csv {
                origin: origin.clone(),
                source,
            })?;
        read_csv(reader, &origin, properties)
    }
}

/// Reads CSV data from any reader; `origin` names it in errors.
///
/// ```
/// use tabseq_data::{frame::FrameExt as _, properties::DatasetProperties, source::read_csv_from};
///
/// let props = DatasetProperties::new(["age", "city"], ["city"], ["status"], Some("ok"))?;
/// let data = "age,city,status\n25,NY,ok\n40,LA,bad\n";
/// let frame = read_csv_from(data.as_bytes(), "inline", &props)?;
/// assert_eq!(frame.numeric("age")?, [25.0, 40.0]);
/// assert_eq!(frame.text("status")?, ["ok", "bad"]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn read_csv_from<R>(
    reader: R,
    origin: &str,
    properties: &DatasetProperties,
) -> Result<DataFrame, LoadError>
where
    R: io::Read,
{
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    read_csv(reader, origin, properties)
}

/// Cells of one column while records are being read.
enum Cells {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

fn read_csv<R>(
    mut reader: csv::Reader<R>,
    origin: &str,
    properties: &DatasetProperties,
) -> Result<DataFrame, LoadError>
where
    R: io::Read,
{
    let csv_error = |source: csv::Error| LoadError::Csv {
        origin: origin.to_owned(),
        source,
    };

    let headers = reader.headers().map_err(csv_error)?.clone();
    for name in properties.required_columns() {
        if !headers.iter().any(|h| h == name) {
            return Err(LoadError::MissingColumn {
                origin: origin.to_owned(),
                name: name.to_owned(),
            });
        }
    }

    let mut cells = headers
        .iter()
        .map(|name| {
            if properties.is_numeric(name) {
                Cells::Numeric(vec![])
            } else {
                Cells::Text(vec![])
            }
        })
        .collect::<Vec<_>>();

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        for ((name, value), column) in headers.iter().zip(&record).zip(&mut cells) {
            match column {
                Cells::Numeric(values) => {
                    values.push(parse_number(value).ok_or_else(|| LoadError::ParseNumber {
                        origin: origin.to_owned(),
                        row,
                        column: name.to_owned(),
                        value: value.to_owned(),
                    })?);
                }
                Cells::Text(values) => values.push(value.to_owned()),
            }
        }
    }

    let columns = headers
        .iter()
        .zip(cells)
        .map(|(name, cells)| match cells {
            Cells::Numeric(values) => Column::new(name.into(), values),
            Cells::Text(values) => Column::new(name.into(), values),
        })
        .collect();
    let frame = DataFrame::new(columns).map_err(|err| LoadError::Frame {
        origin: origin.to_owned(),
        source: err.into(),
    })?;
    log::debug!(
        "parsed {} rows x {} columns from {origin}",
        frame.height(),
        frame.width()
    );
    Ok(frame)
}

fn parse_number(value: &str) -> Option<f64> {
    if value.is_empty() {
        return Some(f64::NAN);
    }
    value.parse().ok()
}

fn check_required_columns(
    frame: &DataFrame,
    properties: &DatasetProperties,
    origin: &str,
) -> Result<(), LoadError> {
    match properties
        .required_columns()
        .find(|name| !frame.has_column(name))
    {
        Some(name) => Err(LoadError::MissingColumn {
            origin: origin.to_owned(),
            name: name.to_owned(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn props() -> DatasetProperties {
        DatasetProperties::new(["age", "city"], ["city"], ["status"], Some("ok")).unwrap()
    }

    #[test]
    fn test_load_csv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "age;city;status;host").unwrap();
        writeln!(file, "25;NY;ok;h1").unwrap();
        writeln!(file, ";LA;bad;h2").unwrap();
        file.flush().unwrap();

        let frame = CsvSource::new(file.path())
            .with_delimiter(b';')
            .load(&props())
            .unwrap();
        assert_eq!(frame.height(), 2);
        let age = frame.numeric("age").unwrap();
        assert_eq!(age[0], 25.0);
        assert!(age[1].is_nan());
        assert_eq!(frame.text("host").unwrap(), ["h1", "h2"]);
    }

    #[test]
    fn test_duplicate_header() {
        let err = read_csv_from("age,city,status,city\n1,NY,ok,LA\n".as_bytes(), "inline", &props())
            .unwrap_err();
        assert!(matches!(err, LoadError::Frame { .. }));
    }

    #[test]
    fn test_missing_declared_column() {
        let err = read_csv_from("age,status\n1,ok\n".as_bytes(), "inline", &props()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { ref name, .. } if name == "city"));
    }

    #[test]
    fn test_unparsable_number() {
        let err =
            read_csv_from("age,city,status\nold,NY,ok\n".as_bytes(), "inline", &props()).unwrap_err();
        assert!(matches!(err, LoadError::ParseNumber { row: 0, .. }));
    }

    #[test]
    fn test_unreadable_file() {
        let err = CsvSource::new("/nonexistent/data.csv")
            .load(&props())
            .unwrap_err();
        assert!(matches!(err, LoadError::Csv { .. }));
    }

    #[test]
    fn test_frame_as_source() {
        let unlabeled =
            DatasetProperties::new(["age", "city"], ["city"], Vec::<String>::new(), None::<String>)
                .unwrap();
        let frame = read_csv_from("age,city\n1,NY\n".as_bytes(), "inline", &unlabeled).unwrap();
        assert!(matches!(
            frame.load(&props()),
            Err(LoadError::MissingColumn { ref name, .. }) if name == "status"
        ));
    }
}
