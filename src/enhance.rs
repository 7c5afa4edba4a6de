//! Deterministic image enhancement: brightness, contrast and sharpening.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use indicatif::ProgressBar;
use log::warn;
use rayon::prelude::*;
use std::fs::{copy, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::EnhanceConfig;
use crate::error::Result;
use crate::quality::mean_luma_rgb;
use crate::types::Sample;

// 3x3 sharpen kernel, divided by SHARPEN_SCALE
const SHARPEN_KERNEL: [[i32; 3]; 3] = [[-2, -2, -2], [-2, 32, -2], [-2, -2, -2]];
const SHARPEN_SCALE: i32 = 16;

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Scale every channel by `factor`
pub fn adjust_brightness(img: &mut RgbImage, factor: f32) {
    if factor == 1.0 {
        return;
    }
    for pixel in img.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = clamp_u8(*channel as f32 * factor);
        }
    }
}

/// Stretch every channel away from the rounded mean luma by `factor`
pub fn adjust_contrast(img: &mut RgbImage, factor: f32) {
    if factor == 1.0 {
        return;
    }
    let mean = mean_luma_rgb(img).round() as f32;
    for pixel in img.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = clamp_u8(mean + (*channel as f32 - mean) * factor);
        }
    }
}

/// Apply the fixed sharpen kernel; the one-pixel border is left untouched
pub fn sharpen(img: &RgbImage) -> RgbImage {
    let (width, height) = img.dimensions();
    let mut out = img.clone();
    if width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut acc = [0i32; 3];
            for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    let p = img.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1);
                    for (c, sum) in acc.iter_mut().enumerate() {
                        *sum += weight * p[c] as i32;
                    }
                }
            }
            let target = out.get_pixel_mut(x, y);
            for (c, sum) in acc.iter().enumerate() {
                // round half away from zero, as integer division truncates
                let rounded = if *sum >= 0 {
                    (sum + SHARPEN_SCALE / 2) / SHARPEN_SCALE
                } else {
                    (sum - SHARPEN_SCALE / 2) / SHARPEN_SCALE
                };
                target[c] = rounded.clamp(0, 255) as u8;
            }
        }
    }
    out
}

/// Run the enhancement chain on a decoded image
pub fn enhance_image(img: &DynamicImage, config: &EnhanceConfig) -> RgbImage {
    let mut rgb = img.to_rgb8();
    adjust_brightness(&mut rgb, config.brightness);
    adjust_contrast(&mut rgb, config.contrast);
    if config.sharpen {
        rgb = sharpen(&rgb);
    }
    rgb
}

/// Encode an RGB image to `path`; JPEG honours `jpeg_quality`, other formats
/// are chosen from the file extension.
pub fn save_rgb(img: &RgbImage, path: &Path, jpeg_quality: u8) -> Result<()> {
    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Jpeg) => {
            let mut writer = BufWriter::new(File::create(path)?);
            let encoder = JpegEncoder::new_with_quality(&mut writer, jpeg_quality);
            DynamicImage::ImageRgb8(img.clone()).write_with_encoder(encoder)?;
            writer.flush()?;
        }
        _ => img.save(path)?,
    }
    Ok(())
}

/// Enhance one image into `output_path`
pub fn enhance_file(input: &Path, output_path: &Path, config: &EnhanceConfig) -> Result<()> {
    let img = image::open(input)?;
    let enhanced = enhance_image(&img, config);
    save_rgb(&enhanced, output_path, config.jpeg_quality)
}

/// Write a sample into `output_dir`, enhancing the image when enabled.
///
/// Returns whether the image was enhanced; an enhancement failure falls back to
/// a verbatim copy. The label file is always copied unchanged.
pub fn write_sample(sample: &Sample, output_dir: &Path, config: &EnhanceConfig) -> Result<bool> {
    let image_output_path = output_dir.join(sample.image_name());

    let enhanced = if config.enabled {
        match enhance_file(&sample.image_path, &image_output_path, config) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to enhance {}: {}. Copying the original instead.",
                    sample.image_name(),
                    e
                );
                copy(&sample.image_path, &image_output_path)?;
                false
            }
        }
    } else {
        copy(&sample.image_path, &image_output_path)?;
        false
    };

    if let Some(label_name) = sample.label_path.file_name() {
        copy(&sample.label_path, output_dir.join(label_name))?;
    }
    Ok(enhanced)
}

/// Write all samples in parallel, returning the per-sample outcome in order
pub fn write_samples(
    samples: &[Sample],
    output_dir: &Path,
    config: &EnhanceConfig,
    pb: &ProgressBar,
) -> Vec<Result<bool>> {
    samples
        .par_iter()
        .map(|sample| {
            let outcome = write_sample(sample, output_dir, config);
            pb.inc(1);
            outcome
        })
        .collect()
}
