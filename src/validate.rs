//! Bounding-box validation of YOLO label files.
//!
//! A sample survives only if its label file exists, holds at least one box, and
//! every box is well formed, uses a known class id and stays inside the image.

use log::info;
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::types::{BoundingBox, CleaningStats, InvalidReason, Sample};

/// Rules a label file is checked against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRules {
    pub num_classes: usize,
    pub tolerance: f64,
}

impl Default for BoxRules {
    fn default() -> Self {
        Self {
            num_classes: 1,
            tolerance: 1e-6,
        }
    }
}

/// Parse one `class_id cx cy w h` line and check it against `rules`
pub fn parse_label_line(line: &str, rules: &BoxRules) -> Result<BoundingBox, InvalidReason> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 5 {
        return Err(InvalidReason::Malformed);
    }

    let class_id: i64 = parts[0].parse().map_err(|_| InvalidReason::Malformed)?;
    let mut coords = [0.0f64; 4];
    for (slot, part) in coords.iter_mut().zip(&parts[1..]) {
        let value: f64 = part.parse().map_err(|_| InvalidReason::Malformed)?;
        if !value.is_finite() {
            return Err(InvalidReason::Malformed);
        }
        *slot = value;
    }

    let class_id = match usize::try_from(class_id) {
        Ok(id) if id < rules.num_classes => id,
        _ => return Err(InvalidReason::ClassOutOfRange),
    };

    let [x_center, y_center, width, height] = coords;
    let bbox = BoundingBox {
        class_id,
        x_center,
        y_center,
        width,
        height,
    };
    if !bbox.is_valid(rules.tolerance) {
        return Err(InvalidReason::Geometry);
    }
    Ok(bbox)
}

/// Parse every non-blank line of a label file's contents
pub fn parse_label_content(content: &str, rules: &BoxRules) -> Result<Vec<BoundingBox>, InvalidReason> {
    let boxes = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_label_line(line, rules))
        .collect::<Result<Vec<_>, _>>()?;

    if boxes.is_empty() {
        return Err(InvalidReason::Empty);
    }
    Ok(boxes)
}

/// Read and validate a label file
pub fn validate_label_file(path: &Path, rules: &BoxRules) -> Result<Vec<BoundingBox>, InvalidReason> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => InvalidReason::MissingLabel,
        _ => InvalidReason::Unreadable,
    })?;
    parse_label_content(&content, rules)
}

/// Drop samples whose label file fails validation, counting each reason
pub fn validate_samples(
    samples: Vec<Sample>,
    rules: &BoxRules,
    stats: &mut CleaningStats,
) -> Vec<Sample> {
    let verdicts: Vec<Result<usize, InvalidReason>> = samples
        .par_iter()
        .map(|sample| validate_label_file(&sample.label_path, rules).map(|boxes| boxes.len()))
        .collect();

    samples
        .into_iter()
        .zip(verdicts)
        .filter_map(|(sample, verdict)| match verdict {
            Ok(_) => Some(sample),
            Err(reason) => {
                info!("Removing {}: {}", sample.image_name(), reason);
                stats.increment_invalid(reason);
                None
            }
        })
        .collect()
}
