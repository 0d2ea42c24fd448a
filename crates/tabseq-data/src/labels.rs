//! Label-to-index mapping.
//!
//! A [`LabelMapping`] assigns every raw value of a label column a dense index
//! in `[0, K)`. When a benign label is declared it always receives index 0,
//! whether or not it occurs in the data, so anomaly thresholds downstream can
//! rely on "0 means normal". The remaining values are ordered
//! lexicographically, which makes the mapping independent of row order.
//!
//! Mappings are built once by the processor and never mutated afterwards;
//! they are shared read-only by anything that needs to decode predictions.
//!
//! # Example
//!
//! ```
//! use tabseq_data::labels::{LabelMapping, UnknownLabelPolicy};
//!
//! let mapping = LabelMapping::fit(
//!     "status",
//!     ["bad", "ok", "worse", "ok"],
//!     Some("ok"),
//!     UnknownLabelPolicy::Lenient,
//! );
//! assert_eq!(mapping.encode("ok"), Ok(0));
//! assert_eq!(mapping.encode("bad"), Ok(1));
//! assert_eq!(mapping.decode(2), Some("worse"));
//! // unseen values fall into the "unknown" slot in lenient mode
//! assert_eq!(mapping.encode("new"), Ok(mapping.unknown_index()));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::{FrameError, ProcessError, UnknownLabelError},
    frame::{DataFrame, FrameExt},
};

/// How label values that were not seen during fitting are encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownLabelPolicy {
    /// Encode as [`LabelMapping::unknown_index`].
    #[default]
    Lenient,
    /// Fail with [`UnknownLabelError`].
    Strict,
}

/// Dense integer encoding of one label column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMapping {
    column: String,
    classes: Vec<String>,
    index: BTreeMap<String, usize>,
    benign: Option<usize>,
    policy: UnknownLabelPolicy,
}

impl LabelMapping {
    /// Builds the mapping from the observed values of a label column.
    pub fn fit<I, S>(
        column: impl Into<String>,
        values: I,
        benign_label: Option<&str>,
        policy: UnknownLabelPolicy,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let observed = values
            .into_iter()
            .map(|v| v.as_ref().to_owned())
            .collect::<BTreeSet<_>>();
        let classes = benign_label
            .map(str::to_owned)
            .into_iter()
            .chain(
                observed
                    .into_iter()
                    .filter(|value| Some(value.as_str()) != benign_label),
            )
            .collect::<Vec<_>>();
        let index = classes
            .iter()
            .enumerate()
            .map(|(idx, value)| (value.clone(), idx))
            .collect();
        Self {
            column: column.into(),
            classes,
            index,
            benign: benign_label.map(|_| 0),
            policy,
        }
    }

    /// Returns a copy of this mapping with a different unknown-value policy.
    #[must_use]
    pub fn with_policy(mut self, policy: UnknownLabelPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Raw label values, indexed by their code.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of known classes `K`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    #[must_use]
    pub fn policy(&self) -> UnknownLabelPolicy {
        self.policy
    }

    /// Index reserved for the benign class, if one was declared (always 0).
    #[must_use]
    pub fn benign_index(&self) -> Option<usize> {
        self.benign
    }

    #[must_use]
    pub fn is_benign(&self, index: usize) -> bool {
        self.benign == Some(index)
    }

    /// Code assigned to unseen values in lenient mode (`K`, one past the last class).
    #[must_use]
    pub fn unknown_index(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, value: &str) -> Result<usize, UnknownLabelError> {
        match (self.index.get(value), self.policy) {
            (Some(idx), _) => Ok(*idx),
            (None, UnknownLabelPolicy::Lenient) => Ok(self.unknown_index()),
            (None, UnknownLabelPolicy::Strict) => Err(UnknownLabelError {
                column: self.column.clone(),
                value: value.to_owned(),
            }),
        }
    }

    /// Maps a code back to its raw label value; `None` for the unknown slot.
    #[must_use]
    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// Encodes a whole column of raw values.
    #[expect(clippy::cast_precision_loss)]
    pub fn encode_values<S>(&self, values: &[S]) -> Result<Vec<f64>, UnknownLabelError>
    where
        S: AsRef<str>,
    {
        let mut unknown = 0_usize;
        let codes = values
            .iter()
            .map(|value| {
                let code = self.encode(value.as_ref())?;
                if code == self.unknown_index() {
                    unknown += 1;
                }
                Ok::<_, UnknownLabelError>(code as f64)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if unknown > 0 {
            log::warn!(
                "label column '{}': {unknown} values not seen during fit, encoded as {}",
                self.column,
                self.unknown_index()
            );
        }
        Ok(codes)
    }
}

/// The label mappings of every label column, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelEncoding {
    mappings: Vec<LabelMapping>,
}

impl LabelEncoding {
    /// Fits one mapping per label column of `frame`.
    pub fn fit(
        frame: &DataFrame,
        columns: &[String],
        benign_label: Option<&str>,
        policy: UnknownLabelPolicy,
    ) -> Result<Self, FrameError> {
        let mappings = columns
            .iter()
            .map(|column| {
                let values = frame.strings(column)?;
                Ok(LabelMapping::fit(
                    column.as_str(),
                    values.iter(),
                    benign_label,
                    policy,
                ))
            })
            .collect::<Result<Vec<_>, FrameError>>()?;
        Ok(Self { mappings })
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&LabelMapping> {
        self.mappings.iter().find(|m| m.column() == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelMapping> + '_ {
        self.mappings.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Replaces every mapped label column of `frame` with its numeric codes.
    ///
    /// Label columns absent from `frame` are skipped, so unlabeled inference
    /// data passes through unchanged.
    pub fn encode_frame(&self, frame: &mut DataFrame) -> Result<(), ProcessError> {
        for mapping in &self.mappings {
            if !frame.has_column(mapping.column()) {
                continue;
            }
            let codes = mapping.encode_values(&frame.strings(mapping.column())?)?;
            frame.set_numeric(mapping.column(), codes)?;
        }
        Ok(())
    }
}
