//! Error types for dataset curation

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors that abort a curation run.
///
/// Per-sample problems (bad labels, unreadable images) never surface here; they
/// are counted in [`crate::types::CleaningStats`] and the sample is dropped.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Class '{class_name}' not found in {}", path.display())]
    ClassNotFound { class_name: String, path: PathBuf },

    #[error("Metric '{metric}' missing from {}", path.display())]
    MissingMetric { metric: String, path: PathBuf },

    #[error("Trainer command `{command}` failed with {status}")]
    TrainerFailed { command: String, status: ExitStatus },
}

/// Result type alias for curation operations
pub type Result<T> = std::result::Result<T, Error>;
