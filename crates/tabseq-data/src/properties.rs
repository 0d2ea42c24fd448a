//! Dataset schema descriptor.
//!
//! [`DatasetProperties`] declares which columns of the raw source are model
//! features, how they partition into numeric and categorical features, which
//! columns carry labels, and which label value denotes the benign
//! (non-anomalous) class. Properties are validated once on construction and
//! are read-only afterwards.
//!
//! # Example
//!
//! ```
//! use tabseq_data::properties::DatasetProperties;
//!
//! let props = DatasetProperties::new(["age", "city"], ["city"], ["status"], Some("ok"))?;
//! assert_eq!(props.numeric_features(), ["age"]);
//! assert_eq!(props.categorical_features(), ["city"]);
//! assert_eq!(props.benign_label(), Some("ok"));
//! # Ok::<(), tabseq_data::error::ConfigError>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Immutable schema of a tabular dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PropertiesDef")]
pub struct DatasetProperties {
    features: Vec<String>,
    categorical_features: Vec<String>,
    numeric_features: Vec<String>,
    labels: Vec<String>,
    benign_label: Option<String>,
}

/// Serialized form, validated into [`DatasetProperties`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PropertiesDef {
    features: Vec<String>,
    #[serde(default)]
    categorical_features: Vec<String>,
    #[serde(default)]
    numeric_features: Option<Vec<String>>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    benign_label: Option<String>,
}

impl TryFrom<PropertiesDef> for DatasetProperties {
    type Error = ConfigError;

    fn try_from(def: PropertiesDef) -> Result<Self, Self::Error> {
        let props = Self::new(
            def.features,
            def.categorical_features,
            def.labels,
            def.benign_label,
        )?;
        if let Some(numeric) = def.numeric_features {
            let declared = numeric.iter().collect::<BTreeSet<_>>();
            let derived = props.numeric_features.iter().collect::<BTreeSet<_>>();
            if let Some(name) = declared.symmetric_difference(&derived).next() {
                return Err(ConfigError::PartitionMismatch {
                    name: (*name).clone(),
                });
            }
        }
        Ok(props)
    }
}

impl DatasetProperties {
    /// Validates and builds dataset properties.
    ///
    /// Numeric features are every declared feature that is not categorical,
    /// in declaration order. Categorical features are likewise reordered to
    /// follow the declaration order of `features`, so tensor columns always
    /// line up with the schema.
    pub fn new<F, C, L>(
        features: F,
        categorical_features: C,
        labels: L,
        benign_label: Option<impl Into<String>>,
    ) -> Result<Self, ConfigError>
    where
        F: IntoIterator,
        F::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        let features = features.into_iter().map(Into::into).collect::<Vec<_>>();
        let categorical = categorical_features
            .into_iter()
            .map(Into::into)
            .collect::<BTreeSet<String>>();
        let labels = labels.into_iter().map(Into::into).collect::<Vec<_>>();
        let benign_label = benign_label.map(Into::into);

        if features.is_empty() {
            return Err(ConfigError::EmptyFeatures);
        }
        let mut seen = BTreeSet::new();
        for name in &features {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateFeature { name: name.clone() });
            }
        }
        if let Some(name) = categorical.iter().find(|name| !seen.contains(name.as_str())) {
            return Err(ConfigError::UnknownCategorical { name: name.clone() });
        }
        let mut seen_labels = BTreeSet::new();
        for name in &labels {
            if seen.contains(name.as_str()) {
                return Err(ConfigError::LabelIsFeature { name: name.clone() });
            }
            if !seen_labels.insert(name.as_str()) {
                return Err(ConfigError::DuplicateLabel { name: name.clone() });
            }
        }
        if let (Some(value), true) = (&benign_label, labels.is_empty()) {
            return Err(ConfigError::BenignWithoutLabels {
                value: value.clone(),
            });
        }

        let (categorical_features, numeric_features): (Vec<_>, Vec<_>) = features
            .iter()
            .cloned()
            .partition(|name| categorical.contains(name));

        Ok(Self {
            features,
            categorical_features,
            numeric_features,
            labels,
            benign_label,
        })
    }

    /// All declared features, in declaration order.
    #[must_use]
    pub fn features(&self) -> &[String] {
        &self.features
    }

    #[must_use]
    pub fn categorical_features(&self) -> &[String] {
        &self.categorical_features
    }

    #[must_use]
    pub fn numeric_features(&self) -> &[String] {
        &self.numeric_features
    }

    /// Label column names; empty for unsupervised datasets.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn benign_label(&self) -> Option<&str> {
        self.benign_label.as_deref()
    }

    #[must_use]
    pub fn is_supervised(&self) -> bool {
        !self.labels.is_empty()
    }

    #[must_use]
    pub fn is_categorical(&self, name: &str) -> bool {
        self.categorical_features.iter().any(|f| f == name)
    }

    #[must_use]
    pub fn is_numeric(&self, name: &str) -> bool {
        self.numeric_features.iter().any(|f| f == name)
    }

    /// Columns the raw source must provide: features followed by labels.
    pub fn required_columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.features
            .iter()
            .chain(&self.labels)
            .map(String::as_str)
    }
}

/// Named collection of dataset properties, typically read from a JSON file.
///
/// ```
/// use tabseq_data::properties::DatasetCatalog;
///
/// let catalog: DatasetCatalog = serde_json::from_str(r#"{
///     "datasets": {
///         "flows": {
///             "features": ["PROTOCOL", "IN_BYTES"],
///             "categorical_features": ["PROTOCOL"],
///             "labels": ["Attack"],
///             "benign_label": "Benign"
///         }
///     }
/// }"#)?;
/// let props = catalog.get("flows")?;
/// assert_eq!(props.numeric_features(), ["IN_BYTES"]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetCatalog {
    pub datasets: BTreeMap<String, DatasetProperties>,
}

impl DatasetCatalog {
    pub fn get(&self, name: &str) -> Result<&DatasetProperties, ConfigError> {
        self.datasets
            .get(name)
            .ok_or_else(|| ConfigError::UnknownDataset {
                name: name.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_benign() -> Option<&'static str> {
        None
    }

    #[test]
    fn test_partition_follows_declaration_order() {
        let props =
            DatasetProperties::new(["b", "a", "d", "c"], ["c", "b"], ["y"], no_benign()).unwrap();
        assert_eq!(props.categorical_features(), ["b", "c"]);
        assert_eq!(props.numeric_features(), ["a", "d"]);
        assert!(props.is_categorical("b"));
        assert!(props.is_numeric("d"));
        assert_eq!(
            props.required_columns().collect::<Vec<_>>(),
            ["b", "a", "d", "c", "y"]
        );
    }

    #[test]
    fn test_rejects_invalid_schema() {
        let empty: [&str; 0] = [];
        assert_eq!(
            DatasetProperties::new(empty, empty, empty, no_benign()),
            Err(ConfigError::EmptyFeatures)
        );
        assert_eq!(
            DatasetProperties::new(["a", "a"], empty, empty, no_benign()),
            Err(ConfigError::DuplicateFeature { name: "a".into() })
        );
        assert_eq!(
            DatasetProperties::new(["a"], ["b"], empty, no_benign()),
            Err(ConfigError::UnknownCategorical { name: "b".into() })
        );
        assert_eq!(
            DatasetProperties::new(["a"], empty, ["a"], no_benign()),
            Err(ConfigError::LabelIsFeature { name: "a".into() })
        );
        assert_eq!(
            DatasetProperties::new(["a"], empty, empty, Some("ok")),
            Err(ConfigError::BenignWithoutLabels { value: "ok".into() })
        );
    }

    #[test]
    fn test_deserialize_checks_numeric_partition() {
        let ok = r#"{"features": ["a", "b"], "categorical_features": ["b"], "numeric_features": ["a"]}"#;
        let props: DatasetProperties = serde_json::from_str(ok).unwrap();
        assert!(!props.is_supervised());

        let bad = r#"{"features": ["a", "b"], "categorical_features": ["b"], "numeric_features": ["a", "b"]}"#;
        let err = serde_json::from_str::<DatasetProperties>(bad).unwrap_err();
        assert!(err.to_string().contains("exactly one of numeric or categorical"));
    }

    #[test]
    fn test_catalog_unknown_dataset() {
        let catalog = DatasetCatalog::default();
        assert_eq!(
            catalog.get("missing"),
            Err(ConfigError::UnknownDataset {
                name: "missing".into()
            })
        );
    }
}
