//! Annotated samples for checking labels by eye

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

use crate::enhance::save_rgb;
use crate::error::Result;
use crate::io::collect_pairs;
use crate::types::{BoundingBox, Sample};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;
const REVIEW_JPEG_QUALITY: u8 = 90;

/// Parse the well-formed lines of a label file, ignoring the rest
pub fn read_boxes(label_path: &Path) -> Result<Vec<BoundingBox>> {
    let content = fs::read_to_string(label_path)?;
    Ok(content
        .lines()
        .filter_map(|line| {
            let values: Vec<f64> = line
                .split_whitespace()
                .map(|part| part.parse().ok())
                .collect::<Option<Vec<f64>>>()?;
            match values.as_slice() {
                &[class_id, x_center, y_center, width, height] if class_id >= 0.0 => {
                    Some(BoundingBox {
                        class_id: class_id as usize,
                        x_center,
                        y_center,
                        width,
                        height,
                    })
                }
                _ => None,
            }
        })
        .collect())
}

/// Pixel rectangle of a normalized box, `None` when it has no visible area
pub fn pixel_rect(bbox: &BoundingBox, width: u32, height: u32) -> Option<Rect> {
    let (x_min, y_min, x_max, y_max) = bbox.corners();
    let x1 = (x_min * width as f64) as i32;
    let y1 = (y_min * height as f64) as i32;
    let x2 = (x_max * width as f64) as i32;
    let y2 = (y_max * height as f64) as i32;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(Rect::at(x1, y1).of_size((x2 - x1) as u32, (y2 - y1) as u32))
}

/// Draw a sample's boxes and write the result to `output_path`.
///
/// Returns the number of boxes drawn.
pub fn draw_sample(sample: &Sample, output_path: &Path) -> Result<usize> {
    let mut img = image::open(&sample.image_path)?.to_rgb8();
    let (width, height) = img.dimensions();
    let boxes = read_boxes(&sample.label_path)?;

    let mut drawn = 0;
    for bbox in &boxes {
        let Some(rect) = pixel_rect(bbox, width, height) else {
            continue;
        };
        for inset in 0..BOX_THICKNESS {
            let w = rect.width() as i32 - 2 * inset;
            let h = rect.height() as i32 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let inner = Rect::at(rect.left() + inset, rect.top() + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut img, inner, BOX_COLOR);
        }
        drawn += 1;
    }

    save_rgb(&img, output_path, REVIEW_JPEG_QUALITY)?;
    Ok(drawn)
}

/// Save up to `count` random samples of `source` with their boxes drawn
pub fn save_review_samples(
    source: &Path,
    output_dir: &Path,
    count: usize,
    seed: u64,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let pairs = collect_pairs(source)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let chosen: Vec<&Sample> = pairs.choose_multiple(&mut rng, count).collect();
    info!(
        "Saving {} review samples to {}",
        chosen.len(),
        output_dir.display()
    );

    let mut written = Vec::with_capacity(chosen.len());
    for sample in chosen {
        let output_path = output_dir.join(format!("{}_bboxes.jpg", sample.stem()));
        match draw_sample(sample, &output_path) {
            Ok(0) => {
                warn!("{}: no boxes found", sample.image_name());
                written.push(output_path);
            }
            Ok(_) => written.push(output_path),
            Err(e) => warn!("Could not annotate {}: {}", sample.image_name(), e),
        }
    }
    Ok(written)
}
