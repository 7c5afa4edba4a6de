//! Open Images bounding-box CSVs to YOLO label files

use log::{debug, info};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{BoundingBox, LABEL_EXTENSION};

// Every extracted box belongs to the single target class
const TARGET_CLASS_ID: usize = 0;

/// Row of `train-annotations-bbox.csv`; other columns are ignored
#[derive(Debug, Deserialize)]
struct AnnotationRow {
    #[serde(rename = "ImageID")]
    image_id: String,
    #[serde(rename = "LabelName")]
    label_name: String,
    #[serde(rename = "XMin")]
    x_min: String,
    #[serde(rename = "XMax")]
    x_max: String,
    #[serde(rename = "YMin")]
    y_min: String,
    #[serde(rename = "YMax")]
    y_max: String,
}

impl AnnotationRow {
    fn to_bbox(&self) -> Option<BoundingBox> {
        let x_min: f64 = self.x_min.trim().parse().ok()?;
        let x_max: f64 = self.x_max.trim().parse().ok()?;
        let y_min: f64 = self.y_min.trim().parse().ok()?;
        let y_max: f64 = self.y_max.trim().parse().ok()?;
        Some(BoundingBox::from_corners(
            TARGET_CLASS_ID,
            x_min,
            x_max,
            y_min,
            y_max,
        ))
    }
}

/// Counts reported by [`generate_yolo_labels`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelStats {
    pub images: usize,
    pub boxes: usize,
}

/// Look up the Open Images label id of `class_name` (case-insensitive) in the
/// headerless `LabelID,ClassName` class descriptions file.
pub fn find_label_id(class_descriptions: &Path, class_name: &str) -> Result<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(class_descriptions)?;

    let wanted = class_name.to_lowercase();
    for record in reader.records() {
        let record = record?;
        if let (Some(label_id), Some(name)) = (record.get(0), record.get(1)) {
            if name.to_lowercase() == wanted {
                return Ok(label_id.to_string());
            }
        }
    }

    Err(Error::ClassNotFound {
        class_name: class_name.to_string(),
        path: class_descriptions.to_path_buf(),
    })
}

fn jpg_stems(images_dir: &Path) -> Result<HashSet<String>> {
    let mut stems = HashSet::new();
    for entry in fs::read_dir(images_dir)? {
        let path = entry?.path();
        let is_jpg = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"));
        if is_jpg {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.insert(stem.to_string());
            }
        }
    }
    Ok(stems)
}

fn remove_existing_labels(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == LABEL_EXTENSION) {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Write one YOLO label file per downloaded image that has boxes of `label_id`.
///
/// Existing `.txt` files in `images_dir` are removed first. Rows for images
/// that were not downloaded, with unparseable coordinates, or whose center
/// falls outside the image are skipped.
pub fn generate_yolo_labels(
    annotations: &Path,
    label_id: &str,
    images_dir: &Path,
) -> Result<LabelStats> {
    let image_stems = jpg_stems(images_dir)?;
    if image_stems.is_empty() {
        return Err(Error::EmptyDataset(format!(
            "no JPG images found in {}",
            images_dir.display()
        )));
    }

    remove_existing_labels(images_dir)?;

    let mut reader = csv::Reader::from_path(annotations)?;
    let mut boxes_by_image: BTreeMap<String, Vec<BoundingBox>> = BTreeMap::new();
    for row in reader.deserialize::<AnnotationRow>() {
        let row = row?;
        if row.label_name != label_id || !image_stems.contains(&row.image_id) {
            continue;
        }
        let Some(bbox) = row.to_bbox() else {
            debug!("Skipping unparseable box for {}", row.image_id);
            continue;
        };
        if !(0.0..=1.0).contains(&bbox.x_center) || !(0.0..=1.0).contains(&bbox.y_center) {
            debug!("Skipping box with center outside the image for {}", row.image_id);
            continue;
        }
        boxes_by_image.entry(row.image_id).or_default().push(bbox);
    }

    let mut stats = LabelStats::default();
    for (image_id, boxes) in &boxes_by_image {
        let label_path = images_dir.join(format!("{}.{}", image_id, LABEL_EXTENSION));
        let mut writer = BufWriter::new(File::create(&label_path)?);
        for bbox in boxes {
            writeln!(writer, "{}", bbox.to_yolo_line())?;
        }
        writer.flush()?;
        stats.images += 1;
        stats.boxes += boxes.len();
    }

    info!(
        "Generated labels for {} images, total {} boxes.",
        stats.images, stats.boxes
    );
    Ok(stats)
}
