//! Tabular data preparation for sequence models.
//!
//! This crate turns a raw table into fixed-size windows of numeric tensors,
//! encoding training and inference data identically (same label mapping,
//! same pre-steps, same training statistics).
//!
//! Tables are [`polars`] data frames; [`frame::FrameExt`] adds the typed
//! column access the pipeline relies on.
//!
//! # Workflow
//!
//! 1. **Describe the schema** ([`properties::DatasetProperties`]): features,
//!    the categorical/numeric partition, label columns and the benign label
//! 2. **Prepare the table** ([`processor::Processor`]): load from a
//!    [`source::DataSource`], encode labels ([`labels::LabelMapping`]), run the
//!    ordered [`transform::PreTransformation`] steps, split train/test
//! 3. **Freeze statistics** ([`statistics::Statistics`]): computed once from
//!    the training split and shared by every split
//! 4. **Materialize tensors** ([`modeling::TabularModeling`]): numeric,
//!    categorical and label matrices plus per-kind
//!    [`pipeline::Pipeline`]s of [`transform::PostTransformation`] steps
//! 5. **Retrieve windows** ([`dataset::TabularDataset`]) in the order drawn
//!    by a [`sampler::WindowSampler`], optionally stacked into
//!    [`batch::Batch`]es
//!
//! Stock steps live in [`preprocessing`] and [`postprocessing`]; closures
//! can be registered with [`transform::pre_fn`] and [`transform::post_fn`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tabseq_data::{
//!     dataset::TabularDataset,
//!     frame::FrameExt as _,
//!     modeling::TabularModeling,
//!     preprocessing::CategoricalLevels,
//!     processor::{Processor, ProcessorConfig, SplitStrategy},
//!     properties::DatasetProperties,
//!     sampler::{RandomSlidingWindowSampler, WindowSampler},
//!     source::read_csv_from,
//!     statistics::Statistics,
//! };
//!
//! let props = DatasetProperties::new(["age", "city"], ["city"], ["status"], Some("ok"))?;
//! let csv = "age,city,status\n25,NY,ok\n40,LA,bad\n30,NY,ok\n";
//! let raw = read_csv_from(csv.as_bytes(), "inline", &props)?;
//!
//! let levels = CategoricalLevels::fit(&raw, &props, 4)?;
//! let config = ProcessorConfig {
//!     split: SplitStrategy::Ratio(1.0),
//!     ..ProcessorConfig::default()
//! };
//! let mut processor = Processor::new(raw, props.clone(), config)?;
//! processor.add_step(levels, 1);
//! let (train, _test) = processor.fit()?;
//! assert_eq!(train.numeric("status")?, [0.0, 1.0, 0.0]);
//!
//! let stats = Arc::new(Statistics::from_training(&train, &props)?);
//! let dataset = TabularDataset::new(TabularModeling::from_frame(&train, &props)?, stats, 2)?;
//! let sampler = RandomSlidingWindowSampler::new(&dataset, 2)?;
//! let windows = sampler.iter_ordered().collect::<Vec<_>>();
//! assert_eq!(windows, [vec![0, 1], vec![1, 2]]);
//!
//! let labels = windows
//!     .iter()
//!     .map(|window| {
//!         let item = dataset.get(window)?;
//!         Ok(item.labels.map(|labels| labels.column(0).to_vec()))
//!     })
//!     .collect::<Result<Vec<_>, tabseq_data::Error>>()?;
//! assert_eq!(labels, [Some(vec![0.0, 1.0]), Some(vec![1.0, 0.0])]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod batch;
pub mod dataset;
pub mod error;
pub mod frame;
pub mod labels;
pub mod modeling;
pub mod pipeline;
pub mod postprocessing;
pub mod preprocessing;
pub mod processor;
pub mod properties;
pub mod sampler;
pub mod source;
pub mod statistics;
pub mod step;
pub mod transform;

pub use self::error::Error;
