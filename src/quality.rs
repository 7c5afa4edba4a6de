//! Brightness-based image quality filter

use image::{DynamicImage, RgbImage};
use log::{info, warn};
use rayon::prelude::*;

use crate::config::BrightnessBand;
use crate::error::Result;
use crate::types::{CleaningStats, Sample};

/// Outcome of scoring an image against a brightness band
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Brightness {
    TooDark(f64),
    TooBright(f64),
    Ok(f64),
}

/// Rec.601 luma of one RGB pixel
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// Mean luma over all pixels of an RGB image (0-255 scale)
pub fn mean_luma_rgb(img: &RgbImage) -> f64 {
    let pixel_count = img.width() as u64 * img.height() as u64;
    if pixel_count == 0 {
        return 0.0;
    }
    let sum: f64 = img.pixels().map(|p| luma(p[0], p[1], p[2])).sum();
    sum / pixel_count as f64
}

/// Mean luma of an image of any color type
pub fn mean_luma(img: &DynamicImage) -> f64 {
    mean_luma_rgb(&img.to_rgb8())
}

/// Place a score relative to the band; both bounds are inclusive
pub fn classify(score: f64, band: &BrightnessBand) -> Brightness {
    if score < band.min {
        Brightness::TooDark(score)
    } else if score > band.max {
        Brightness::TooBright(score)
    } else {
        Brightness::Ok(score)
    }
}

/// Decode an image and compute its brightness score
pub fn score_image(sample: &Sample) -> Result<f64> {
    let img = image::open(&sample.image_path)?;
    Ok(mean_luma(&img))
}

/// Drop samples that cannot be decoded or fall outside the brightness band
pub fn filter_samples(
    samples: Vec<Sample>,
    band: &BrightnessBand,
    stats: &mut CleaningStats,
) -> Vec<Sample> {
    let scores: Vec<Result<f64>> = samples.par_iter().map(score_image).collect();

    samples
        .into_iter()
        .zip(scores)
        .filter_map(|(sample, score)| match score.map(|s| classify(s, band)) {
            Ok(Brightness::Ok(_)) => Some(sample),
            Ok(Brightness::TooDark(score)) => {
                info!(
                    "Removing {}: too dark (brightness={:.1})",
                    sample.image_name(),
                    score
                );
                stats.increment_too_dark();
                None
            }
            Ok(Brightness::TooBright(score)) => {
                info!(
                    "Removing {}: too bright (brightness={:.1})",
                    sample.image_name(),
                    score
                );
                stats.increment_too_bright();
                None
            }
            Err(e) => {
                warn!("Removing {}: unreadable image ({})", sample.image_name(), e);
                stats.increment_unreadable();
                None
            }
        })
        .collect()
}
