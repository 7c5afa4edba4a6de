//! Curation of single-class YOLO datasets
//!
//! This library turns a directory of images and YOLO label files into a clean,
//! deduplicated and split dataset ready for training, and drives the external
//! Ultralytics tool to train and compare models on it.

pub mod config;
pub mod conversion;
pub mod dataset;
pub mod dedup;
pub mod enhance;
pub mod error;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod quality;
pub mod review;
pub mod train;
pub mod types;
pub mod utils;
pub mod validate;

// Re-export commonly used types and functions
pub use config::{Cli, CleanConfig, Command, DedupMethod};
pub use dataset::{split_dataset, split_samples, SplitRatios};
pub use error::{Error, Result};
pub use pipeline::{clean_dataset, run_pipeline, CleanOutcome, RunLayout};
pub use types::{BoundingBox, CleaningStats, InvalidReason, Sample, SplitData};
