//! Typed column access on [`polars`] data frames.
//!
//! Tables travel through the pipeline as polars [`DataFrame`]s. The
//! [`FrameExt`] trait adds the few typed operations the pipeline needs on top
//! of them: numeric columns are read as `f64` (nulls become NaN), text columns
//! as owned strings, and row selection always preserves row order, since
//! sequential consumers window over it.

use std::ops::Range;

use polars::prelude::{BooleanChunked, Column, DataType, NewChunkedArray as _, PolarsError};

pub use polars::prelude::DataFrame;

use crate::error::FrameError;

impl From<PolarsError> for FrameError {
    fn from(err: PolarsError) -> Self {
        Self::Polars {
            message: err.to_string(),
        }
    }
}

/// Pipeline-level column and row operations on a [`DataFrame`].
///
/// ```
/// use tabseq_data::frame::FrameExt as _;
///
/// let mut frame = polars::df!("age" => [25.0, 40.0], "city" => ["NY", "LA"])?;
/// assert_eq!(frame.numeric("age")?, [25.0, 40.0]);
/// assert_eq!(frame.text("city")?, ["NY", "LA"]);
///
/// frame.map_numeric("age", |v| v / 10.0)?;
/// assert_eq!(frame.numeric("age")?, [2.5, 4.0]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait FrameExt {
    fn has_column(&self, name: &str) -> bool;

    /// Values of a non-text column as `f64`; nulls become NaN.
    fn numeric(&self, name: &str) -> Result<Vec<f64>, FrameError>;

    /// Values of a text column; nulls become empty strings.
    fn text(&self, name: &str) -> Result<Vec<String>, FrameError>;

    /// Cell values rendered as strings, numeric columns included.
    fn strings(&self, name: &str) -> Result<Vec<String>, FrameError>;

    /// Inserts a `Float64` column, replacing (in place) any column with the same name.
    fn set_numeric(&mut self, name: &str, values: Vec<f64>) -> Result<(), FrameError>;

    /// Rewrites a column cell by cell; the result is a `Float64` column.
    fn map_numeric<F>(&mut self, name: &str, f: F) -> Result<(), FrameError>
    where
        F: FnMut(f64) -> f64;

    /// Keeps the rows whose `keep` flag is set, preserving order.
    fn filter_rows(&self, keep: &[bool]) -> Result<DataFrame, FrameError>;

    /// Copies a contiguous range of rows into a new frame.
    fn slice_rows(&self, rows: Range<usize>) -> Result<DataFrame, FrameError>;

    /// Splits into `[0, row)` and `[row, height)`.
    fn split_rows(&self, row: usize) -> Result<(DataFrame, DataFrame), FrameError>;
}

fn lookup<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Column, FrameError> {
    frame.column(name).map_err(|_| FrameError::MissingColumn {
        name: name.to_owned(),
    })
}

impl FrameExt for DataFrame {
    fn has_column(&self, name: &str) -> bool {
        self.get_column_index(name).is_some()
    }

    fn numeric(&self, name: &str) -> Result<Vec<f64>, FrameError> {
        let column = lookup(self, name)?;
        if matches!(column.dtype(), DataType::String) {
            return Err(FrameError::ColumnType {
                name: name.to_owned(),
                expected: "numeric",
            });
        }
        let column = column.cast(&DataType::Float64)?;
        Ok(column
            .f64()?
            .into_iter()
            .map(|value| value.unwrap_or(f64::NAN))
            .collect())
    }

    fn text(&self, name: &str) -> Result<Vec<String>, FrameError> {
        let values = lookup(self, name)?
            .str()
            .map_err(|_| FrameError::ColumnType {
                name: name.to_owned(),
                expected: "text",
            })?;
        Ok(values
            .into_iter()
            .map(|value| value.unwrap_or_default().to_owned())
            .collect())
    }

    fn strings(&self, name: &str) -> Result<Vec<String>, FrameError> {
        if matches!(lookup(self, name)?.dtype(), DataType::String) {
            return self.text(name);
        }
        Ok(self.numeric(name)?.iter().map(f64::to_string).collect())
    }

    fn set_numeric(&mut self, name: &str, values: Vec<f64>) -> Result<(), FrameError> {
        if self.width() > 0 && values.len() != self.height() {
            return Err(FrameError::LengthMismatch {
                name: name.to_owned(),
                expected: self.height(),
                actual: values.len(),
            });
        }
        self.with_column(Column::new(name.into(), values))?;
        Ok(())
    }

    fn map_numeric<F>(&mut self, name: &str, f: F) -> Result<(), FrameError>
    where
        F: FnMut(f64) -> f64,
    {
        let values = self.numeric(name)?.into_iter().map(f).collect();
        self.set_numeric(name, values)
    }

    fn filter_rows(&self, keep: &[bool]) -> Result<DataFrame, FrameError> {
        if keep.len() != self.height() {
            return Err(FrameError::LengthMismatch {
                name: "row mask".to_owned(),
                expected: self.height(),
                actual: keep.len(),
            });
        }
        let mask = BooleanChunked::from_slice("keep".into(), keep);
        Ok(self.filter(&mask)?)
    }

    #[expect(clippy::cast_possible_wrap)]
    fn slice_rows(&self, rows: Range<usize>) -> Result<DataFrame, FrameError> {
        if rows.start > rows.end || rows.end > self.height() {
            return Err(FrameError::RowRange {
                start: rows.start,
                end: rows.end,
                len: self.height(),
            });
        }
        Ok(self.slice(rows.start as i64, rows.len()))
    }

    fn split_rows(&self, row: usize) -> Result<(DataFrame, DataFrame), FrameError> {
        Ok((self.slice_rows(0..row)?, self.slice_rows(row..self.height())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        polars::df!(
            "x" => [1.0, 2.0, 3.0, 4.0],
            "tag" => ["a", "b", "c", "d"]
        )
        .unwrap()
    }

    #[test]
    fn test_set_numeric_rejects_length_mismatch() {
        let mut frame = sample_frame();
        let err = frame.set_numeric("y", vec![1.0]).unwrap_err();
        assert_eq!(
            err,
            FrameError::LengthMismatch {
                name: "y".into(),
                expected: 4,
                actual: 1
            }
        );
    }

    #[test]
    fn test_set_numeric_replaces_in_place() {
        let mut frame = sample_frame();
        frame.set_numeric("x", vec![0.0; 4]).unwrap();
        assert_eq!(frame.get_column_index("x"), Some(0));
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.numeric("x").unwrap(), [0.0; 4]);
    }

    #[test]
    fn test_typed_access() {
        let frame = sample_frame();
        assert!(matches!(
            frame.text("x"),
            Err(FrameError::ColumnType { expected: "text", .. })
        ));
        assert!(matches!(
            frame.numeric("tag"),
            Err(FrameError::ColumnType { expected: "numeric", .. })
        ));
        assert!(matches!(
            frame.numeric("nope"),
            Err(FrameError::MissingColumn { .. })
        ));
        assert!(frame.has_column("tag"));
        assert!(!frame.has_column("nope"));
    }

    #[test]
    fn test_integer_and_null_cells() {
        let frame = polars::df!(
            "n" => [Some(1), None, Some(3)],
            "s" => [Some("a"), None, Some("c")]
        )
        .unwrap();
        let n = frame.numeric("n").unwrap();
        assert_eq!((n[0], n[2]), (1.0, 3.0));
        assert!(n[1].is_nan());
        assert_eq!(frame.text("s").unwrap(), ["a", "", "c"]);
        assert_eq!(frame.strings("n").unwrap()[0], "1");
    }

    #[test]
    fn test_filter_rows_preserves_order() {
        let frame = sample_frame();
        let kept = frame.filter_rows(&[false, true, false, true]).unwrap();
        assert_eq!(kept.height(), 2);
        assert_eq!(kept.numeric("x").unwrap(), [2.0, 4.0]);
        assert_eq!(kept.text("tag").unwrap(), ["b", "d"]);
        assert!(frame.filter_rows(&[true]).is_err());
    }

    #[test]
    fn test_split_rows() {
        let frame = sample_frame();
        let (head, tail) = frame.split_rows(3).unwrap();
        assert_eq!(head.numeric("x").unwrap(), [1.0, 2.0, 3.0]);
        assert_eq!(tail.text("tag").unwrap(), ["d"]);
        assert!(matches!(
            frame.split_rows(5),
            Err(FrameError::RowRange { end: 5, len: 4, .. })
        ));
    }
}
