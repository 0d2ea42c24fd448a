//! Column statistics for tabular training data.
//!
//! This crate provides the small set of summaries the data pipeline needs to
//! derive normalization parameters from a training split:
//!
//! - **Descriptive statistics**: min, max, mean, median, and (population and
//!   sample) standard deviation of a numeric column
//! - **Frequency tables**: value counts, most-frequent levels, and
//!   inverse-frequency class weights for categorical and label columns
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing numeric columns
//! - [`frequency`]: Value counts and level selection for discrete columns
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use tabseq_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Selecting the most frequent levels
//!
//! ```
//! use tabseq_stats::frequency::ValueCounts;
//!
//! let counts = ValueCounts::new(["tcp", "udp", "tcp", "icmp", "tcp", "udp"]);
//! assert_eq!(counts.top_k(2), vec!["tcp", "udp"]);
//! ```

pub mod descriptive;
pub mod frequency;
