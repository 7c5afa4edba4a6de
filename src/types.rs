use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// Supported image formats
pub const IMG_FORMATS: &[&str] = &["bmp", "jpeg", "jpg", "png", "tif", "tiff", "webp"];

// Extension used by YOLO label files
pub const LABEL_EXTENSION: &str = "txt";

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// Check whether a path carries one of the supported image extensions
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| get_image_extensions_set().contains(&ext.to_lowercase()))
}

/// One image file plus the label file sharing its stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub image_path: PathBuf,
    pub label_path: PathBuf,
}

impl Sample {
    /// Pair an image with the `<stem>.txt` label in `labels_dir`
    pub fn from_image(image_path: PathBuf, labels_dir: &Path) -> Self {
        let stem = image_path.file_stem().unwrap_or_default().to_string_lossy();
        // Whole stem is kept: `photo.v2.jpg` pairs with `photo.v2.txt`
        let label_path = labels_dir.join(format!("{}.{}", stem, LABEL_EXTENSION));
        Self {
            image_path,
            label_path,
        }
    }

    /// Shared base file name of the image and its label
    pub fn stem(&self) -> String {
        self.image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Image file name, used for log lines and output paths
    pub fn image_name(&self) -> String {
        self.image_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A YOLO box in normalized center form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub class_id: usize,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Build a box from normalized corner coordinates
    pub fn from_corners(class_id: usize, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            class_id,
            x_center: (x_min + x_max) / 2.0,
            y_center: (y_min + y_max) / 2.0,
            width: x_max - x_min,
            height: y_max - y_min,
        }
    }

    /// Whether the box has positive extent and lies inside the unit square.
    ///
    /// `tolerance` only relaxes the outer edges, so that `0.550000 0.900000`
    /// style labels rounded to six decimals are not rejected.
    pub fn is_valid(&self, tolerance: f64) -> bool {
        let (x_min, y_min, x_max, y_max) = self.corners();
        self.width > 0.0
            && self.width <= 1.0
            && self.height > 0.0
            && self.height <= 1.0
            && x_min >= -tolerance
            && x_max <= 1.0 + tolerance
            && y_min >= -tolerance
            && y_max <= 1.0 + tolerance
    }

    /// Normalized (x_min, y_min, x_max, y_max)
    pub fn corners(&self) -> (f64, f64, f64, f64) {
        (
            self.x_center - self.width / 2.0,
            self.y_center - self.height / 2.0,
            self.x_center + self.width / 2.0,
            self.y_center + self.height / 2.0,
        )
    }

    /// Format as a YOLO label line (without newline)
    pub fn to_yolo_line(&self) -> String {
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// Why a sample's label file was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    MissingLabel,
    Unreadable,
    Empty,
    Malformed,
    ClassOutOfRange,
    Geometry,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InvalidReason::MissingLabel => "no label file",
            InvalidReason::Unreadable => "unreadable label file",
            InvalidReason::Empty => "no bounding boxes",
            InvalidReason::Malformed => "malformed label line",
            InvalidReason::ClassOutOfRange => "class id out of range",
            InvalidReason::Geometry => "box outside image bounds",
        };
        f.write_str(text)
    }
}

// Struct to hold the paths to the output directories for train/val/test splits
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub train_images_dir: PathBuf,
    pub train_labels_dir: PathBuf,
    pub val_images_dir: PathBuf,
    pub val_labels_dir: PathBuf,
    pub test_images_dir: PathBuf,
    pub test_labels_dir: PathBuf,
}

// Struct to hold the split datasets for training, validation, and testing
#[derive(Debug, Clone, Default)]
pub struct SplitData {
    pub train: Vec<Sample>,
    pub val: Vec<Sample>,
    pub test: Vec<Sample>,
}

impl SplitData {
    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }
}

// Struct to hold cleaning statistics
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub total_images: usize,
    pub invalid_bbox_removed: usize,
    pub invalid_reasons: BTreeMap<InvalidReason, usize>,
    pub unreadable_removed: usize,
    pub too_dark_removed: usize,
    pub too_bright_removed: usize,
    pub duplicates_removed: usize,
    pub write_failed: usize,
    pub kept: usize,
    pub enhanced: usize,
}

impl CleaningStats {
    pub fn new(total_images: usize) -> Self {
        Self {
            total_images,
            ..Self::default()
        }
    }

    pub fn increment_invalid(&mut self, reason: InvalidReason) {
        self.invalid_bbox_removed += 1;
        *self.invalid_reasons.entry(reason).or_insert(0) += 1;
    }

    pub fn increment_unreadable(&mut self) {
        self.unreadable_removed += 1;
    }

    pub fn increment_too_dark(&mut self) {
        self.too_dark_removed += 1;
    }

    pub fn increment_too_bright(&mut self) {
        self.too_bright_removed += 1;
    }

    pub fn increment_duplicates(&mut self) {
        self.duplicates_removed += 1;
    }

    pub fn increment_write_failed(&mut self) {
        self.write_failed += 1;
    }

    pub fn total_removed(&self) -> usize {
        self.invalid_bbox_removed
            + self.unreadable_removed
            + self.too_dark_removed
            + self.too_bright_removed
            + self.duplicates_removed
            + self.write_failed
    }

    pub fn print_summary(&self) {
        log::info!("=== Cleaning Summary ===");
        log::info!("Total images processed: {}", self.total_images);
        log::info!("Kept: {}", self.kept);
        log::info!("Removed:");
        log::info!("  Invalid bounding boxes: {}", self.invalid_bbox_removed);
        for (reason, count) in &self.invalid_reasons {
            log::info!("    {}: {}", reason, count);
        }
        log::info!("  Unreadable images: {}", self.unreadable_removed);
        log::info!("  Too dark: {}", self.too_dark_removed);
        log::info!("  Too bright: {}", self.too_bright_removed);
        log::info!("  Duplicates: {}", self.duplicates_removed);
        if self.write_failed > 0 {
            log::error!("  Failed to write: {}", self.write_failed);
        }
        if self.enhanced > 0 {
            log::info!("Enhanced: {}", self.enhanced);
        }

        let total_removed = self.total_removed();
        if total_removed > 0 && self.total_images > 0 {
            log::warn!(
                "Total removed: {} images ({:.1}%)",
                total_removed,
                total_removed as f64 / self.total_images as f64 * 100.0
            );
        }
    }
}
