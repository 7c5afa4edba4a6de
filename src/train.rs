//! Driver for the external Ultralytics `yolo` command-line tool.
//!
//! Training itself is not implemented here. The dataset is checked, the tool is
//! launched with inherited stdout/stderr, and a non-zero exit aborts the run.

use log::info;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::io::{count_images, DatasetDescriptor};

/// Settings of one training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub yolo_bin: String,
    pub model: String,
    pub data: PathBuf,
    pub epochs: u32,
    pub imgsz: u32,
    pub batch: u32,
    pub project: PathBuf,
    pub name: String,
    pub evaluate_test: bool,
}

impl TrainConfig {
    pub fn new(data: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            yolo_bin: "yolo".to_string(),
            model: "yolov8n.pt".to_string(),
            data: data.into(),
            epochs: 50,
            imgsz: 640,
            batch: 16,
            project: PathBuf::from("runs"),
            name: name.into(),
            evaluate_test: true,
        }
    }

    /// Directory the trainer writes this run into
    pub fn run_dir(&self) -> PathBuf {
        self.project.join(&self.name)
    }

    /// Best checkpoint written by the trainer
    pub fn best_weights(&self) -> PathBuf {
        self.run_dir().join("weights").join("best.pt")
    }

    /// Arguments of `yolo detect train`
    pub fn train_args(&self) -> Vec<String> {
        vec![
            "detect".to_string(),
            "train".to_string(),
            format!("data={}", self.data.display()),
            format!("model={}", self.model),
            format!("epochs={}", self.epochs),
            format!("imgsz={}", self.imgsz),
            format!("batch={}", self.batch),
            format!("project={}", self.project.display()),
            format!("name={}", self.name),
        ]
    }

    /// Arguments of the test-split `yolo detect val`
    pub fn val_args(&self) -> Vec<String> {
        vec![
            "detect".to_string(),
            "val".to_string(),
            format!("data={}", self.data.display()),
            format!("model={}", self.best_weights().display()),
            "split=test".to_string(),
            format!("imgsz={}", self.imgsz),
            format!("batch={}", self.batch),
        ]
    }
}

/// Refuse to train on a missing descriptor or an empty train split
pub fn check_dataset(data: &Path) -> Result<DatasetDescriptor> {
    if !data.is_file() {
        return Err(Error::InvalidConfig(format!(
            "data config not found: {}",
            data.display()
        )));
    }
    let descriptor = DatasetDescriptor::load(data)?;
    let train_dir = descriptor.train_images_dir();
    let train_images = if train_dir.is_dir() {
        count_images(&train_dir)?
    } else {
        0
    };
    if train_images == 0 {
        return Err(Error::EmptyDataset(format!(
            "no training images in {}",
            train_dir.display()
        )));
    }
    info!(
        "Training on {} images from {} ({} class(es))",
        train_images,
        train_dir.display(),
        descriptor.names.len()
    );
    Ok(descriptor)
}

fn run_tool(bin: &str, args: &[String]) -> Result<()> {
    let command_line = format!("{} {}", bin, args.join(" "));
    info!("Running `{}`", command_line);
    let status = Command::new(bin).args(args).status()?;
    if !status.success() {
        return Err(Error::TrainerFailed {
            command: command_line,
            status,
        });
    }
    Ok(())
}

/// Train, then evaluate the best checkpoint on the test split
pub fn train(config: &TrainConfig) -> Result<()> {
    check_dataset(&config.data)?;

    info!("=== Training {} ===", config.name);
    run_tool(&config.yolo_bin, &config.train_args())?;

    if config.evaluate_test {
        info!("=== Evaluating on test set ===");
        run_tool(&config.yolo_bin, &config.val_args())?;
    }

    info!(
        "Training complete. Best model saved to: {}",
        config.best_weights().display()
    );
    Ok(())
}
