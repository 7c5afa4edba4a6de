use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

// Class extracted and trained on when no names are given
pub const DEFAULT_CLASS_NAME: &str = "Laptop";

/// Command-line interface for preparing single-class YOLO datasets.
#[derive(Parser, Debug, Clone)]
#[command(name = "yolo-curate", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate YOLO label files from Open Images bounding-box CSVs
    Labels(LabelsArgs),
    /// Validate, filter, deduplicate and enhance a dataset directory
    Clean(CleanArgs),
    /// Split an image/label directory into train/val/test trees
    Split(SplitArgs),
    /// Clean, split and write the dataset descriptor in one go
    Run(RunArgs),
    /// Train and evaluate with the external `yolo` tool
    Train(TrainArgs),
    /// Compare the final metrics of two training runs
    Compare(CompareArgs),
    /// Save random samples with their boxes drawn for manual review
    Review(ReviewArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LabelsArgs {
    /// Open Images class-descriptions-boxable.csv
    #[arg(long = "class_descriptions")]
    pub class_descriptions: PathBuf,

    /// Open Images train-annotations-bbox.csv
    #[arg(long = "annotations")]
    pub annotations: PathBuf,

    /// Directory holding the downloaded JPG images; labels are written next to them
    #[arg(short = 'd', long = "images_dir")]
    pub images_dir: PathBuf,

    /// Open Images class name to extract
    #[arg(long = "class_name", default_value = "Laptop")]
    pub class_name: String,
}

#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    /// Directory containing images and same-stem .txt labels
    #[arg(short = 's', long = "source")]
    pub source: PathBuf,

    /// Directory receiving the cleaned images and labels
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    #[command(flatten)]
    pub options: CleanOptions,
}

/// Cleaning overrides shared by `clean` and `run`
#[derive(Args, Debug, Clone, Default)]
pub struct CleanOptions {
    /// YAML file with cleaning settings; flags below override it
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Separate directory holding the label files (defaults to the source directory)
    #[arg(long = "labels_dir")]
    pub labels_dir: Option<PathBuf>,

    /// Minimum acceptable mean brightness (0-255)
    #[arg(long = "min_brightness")]
    pub min_brightness: Option<f64>,

    /// Maximum acceptable mean brightness (0-255)
    #[arg(long = "max_brightness")]
    pub max_brightness: Option<f64>,

    /// Duplicate detection method
    #[arg(long = "dedup", value_enum)]
    pub dedup: Option<DedupMethod>,

    /// Copy survivors verbatim instead of enhancing them
    #[arg(long = "no_enhance")]
    pub no_enhance: bool,

    /// Brightness factor (>1.0 = brighter)
    #[arg(long = "brightness")]
    pub brightness: Option<f32>,

    /// Contrast factor (>1.0 = more contrast)
    #[arg(long = "contrast")]
    pub contrast: Option<f32>,

    /// Disable the sharpening filter
    #[arg(long = "no_sharpen")]
    pub no_sharpen: bool,

    /// Ordered class names; the number of names bounds valid class ids
    #[arg(long = "classes", value_delimiter = ',')]
    pub classes: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    /// Directory containing images and same-stem .txt labels
    #[arg(short = 's', long = "source")]
    pub source: PathBuf,

    /// Root directory for the train/val/test trees
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    #[command(flatten)]
    pub split: SplitOptions,
}

#[derive(Args, Debug, Clone)]
pub struct SplitOptions {
    /// Proportion of the dataset to use for training
    #[arg(long = "train_size", default_value_t = 0.7, value_parser = validate_size)]
    pub train_size: f64,

    /// Proportion of the dataset to use for validation
    #[arg(long = "val_size", default_value_t = 0.15, value_parser = validate_size)]
    pub val_size: f64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Where to write the dataset descriptor (defaults to <output>/dataset.yaml)
    #[arg(long = "data_yaml")]
    pub data_yaml: Option<PathBuf>,

    /// Class names written to the descriptor [default: Laptop]
    #[arg(long = "names", value_delimiter = ',')]
    pub names: Option<Vec<String>>,
}

impl SplitOptions {
    /// Names given on the command line, or the single default class
    pub fn class_names(&self) -> Vec<String> {
        self.names
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_CLASS_NAME.to_string()])
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory containing images and same-stem .txt labels
    #[arg(short = 's', long = "source")]
    pub source: PathBuf,

    /// Working directory; receives cleaned/, splits/ and dataset.yaml
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    #[command(flatten)]
    pub options: CleanOptions,

    #[command(flatten)]
    pub split: SplitOptions,
}

impl RunArgs {
    /// Cleaning configuration of a full run.
    ///
    /// Class names come from `--classes`, then `--names`, then the config file.
    pub fn clean_config(&self) -> Result<CleanConfig> {
        let mut config = CleanConfig::from_options(&self.options)?;
        if self.options.classes.is_empty() {
            if let Some(names) = &self.split.names {
                config.class_names = names.clone();
                config.validate()?;
            }
        }
        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Dataset descriptor produced by `split` or `run`
    #[arg(long = "data")]
    pub data: PathBuf,

    /// Pretrained weights to start from
    #[arg(long = "model", default_value = "yolov8n.pt")]
    pub model: String,

    #[arg(long = "epochs", default_value_t = 50)]
    pub epochs: u32,

    #[arg(long = "imgsz", default_value_t = 640)]
    pub imgsz: u32,

    #[arg(long = "batch", default_value_t = 16)]
    pub batch: u32,

    /// Directory the trainer writes runs into
    #[arg(long = "project", default_value = "runs")]
    pub project: PathBuf,

    /// Run name inside the project directory
    #[arg(long = "name", default_value = "yolov8n-laptop")]
    pub name: String,

    /// Executable of the Ultralytics command-line tool
    #[arg(long = "yolo_bin", default_value = "yolo")]
    pub yolo_bin: String,

    /// Skip the test-split evaluation after training
    #[arg(long = "skip_test")]
    pub skip_test: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    /// Run directory or results file of the baseline model
    #[arg(long = "baseline")]
    pub baseline: PathBuf,

    /// Run directory or results file of the candidate model
    #[arg(long = "candidate")]
    pub candidate: PathBuf,

    #[arg(long = "baseline_label", default_value = "Original Dataset")]
    pub baseline_label: String,

    #[arg(long = "candidate_label", default_value = "Cleaned Dataset")]
    pub candidate_label: String,

    /// Also write the report to this file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReviewArgs {
    /// Directory containing images and same-stem .txt labels
    #[arg(short = 's', long = "source")]
    pub source: PathBuf,

    /// Directory receiving the annotated images
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Number of random samples to save
    #[arg(short = 'n', long = "count", default_value_t = 10)]
    pub count: usize,

    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,
}

// Enumeration for the duplicate signature
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DedupMethod {
    /// SHA-256 of the raw file bytes
    #[default]
    Exact,
    /// 64-bit average hash of the downscaled luma image
    Perceptual,
}

/// Accepted brightness band on a 0-255 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessBand {
    pub min: f64,
    pub max: f64,
}

impl Default for BrightnessBand {
    fn default() -> Self {
        Self {
            min: 30.0,
            max: 220.0,
        }
    }
}

/// Settings of the enhancement stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    pub enabled: bool,
    pub brightness: f32,
    pub contrast: f32,
    pub sharpen: bool,
    pub jpeg_quality: u8,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            brightness: 1.1,
            contrast: 1.1,
            sharpen: true,
            jpeg_quality: 95,
        }
    }
}

/// Full configuration of a cleaning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    pub class_names: Vec<String>,
    pub bbox_tolerance: f64,
    pub brightness: BrightnessBand,
    pub dedup: DedupMethod,
    pub enhance: EnhanceConfig,
    /// Label directory when labels do not sit next to the images
    pub labels_dir: Option<PathBuf>,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            class_names: vec![DEFAULT_CLASS_NAME.to_string()],
            bbox_tolerance: 1e-6,
            brightness: BrightnessBand::default(),
            dedup: DedupMethod::default(),
            enhance: EnhanceConfig::default(),
            labels_dir: None,
        }
    }
}

impl CleanConfig {
    /// Load a configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CleanConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration for a run: file (if any), then CLI overrides
    pub fn from_options(options: &CleanOptions) -> Result<Self> {
        let mut config = match &options.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(labels_dir) = &options.labels_dir {
            config.labels_dir = Some(labels_dir.clone());
        }
        if let Some(min) = options.min_brightness {
            config.brightness.min = min;
        }
        if let Some(max) = options.max_brightness {
            config.brightness.max = max;
        }
        if let Some(method) = options.dedup {
            config.dedup = method;
        }
        if options.no_enhance {
            config.enhance.enabled = false;
        }
        if let Some(factor) = options.brightness {
            config.enhance.brightness = factor;
        }
        if let Some(factor) = options.contrast {
            config.enhance.contrast = factor;
        }
        if options.no_sharpen {
            config.enhance.sharpen = false;
        }
        if !options.classes.is_empty() {
            config.class_names = options.classes.clone();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.class_names.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one class name is required".to_string(),
            ));
        }
        if self.brightness.min > self.brightness.max {
            return Err(Error::InvalidConfig(format!(
                "min brightness {} exceeds max brightness {}",
                self.brightness.min, self.brightness.max
            )));
        }
        if self.bbox_tolerance < 0.0 {
            return Err(Error::InvalidConfig(
                "bbox tolerance must not be negative".to_string(),
            ));
        }
        if self.enhance.brightness <= 0.0 || self.enhance.contrast < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "enhancement factors must be positive (brightness {}, contrast {})",
                self.enhance.brightness, self.enhance.contrast
            )));
        }
        if !(1..=100).contains(&self.enhance.jpeg_quality) {
            return Err(Error::InvalidConfig(format!(
                "JPEG quality {} is outside 1-100",
                self.enhance.jpeg_quality
            )));
        }
        Ok(())
    }
}

// Validate that the size is strictly between 0.0 and 1.0
pub fn validate_size(s: &str) -> std::result::Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val > 0.0 && val < 1.0 => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0 (exclusive)".to_string()),
    }
}
