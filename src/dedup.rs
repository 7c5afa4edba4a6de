//! Duplicate image removal
//!
//! Samples are grouped by a content signature; the first sample of each group
//! (in input order) is kept and the rest are dropped.

use dashmap::DashMap;
use image::imageops::FilterType;
use log::{info, warn};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fs;

use crate::config::DedupMethod;
use crate::error::Result;
use crate::types::{CleaningStats, Sample};

// Side of the downscaled image the average hash is computed on
const AVERAGE_HASH_SIZE: u32 = 8;

/// Content signature of an image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signature {
    Exact([u8; 32]),
    Perceptual(u64),
}

/// SHA-256 of the raw file bytes
pub fn exact_signature(bytes: &[u8]) -> Signature {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Signature::Exact(out)
}

/// 64-bit average hash: one bit per cell of an 8x8 luma thumbnail, set when
/// the cell is brighter than the thumbnail mean.
pub fn average_hash(img: &image::DynamicImage) -> u64 {
    let thumb = img
        .resize_exact(AVERAGE_HASH_SIZE, AVERAGE_HASH_SIZE, FilterType::Triangle)
        .to_luma8();
    let values: Vec<u32> = thumb.pixels().map(|p| p[0] as u32).collect();
    let mean = values.iter().sum::<u32>() as f64 / values.len() as f64;

    values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v as f64 > mean)
        .fold(0u64, |hash, (i, _)| hash | (1u64 << i))
}

/// Compute the signature of a sample's image
pub fn compute_signature(sample: &Sample, method: DedupMethod) -> Result<Signature> {
    match method {
        DedupMethod::Exact => Ok(exact_signature(&fs::read(&sample.image_path)?)),
        DedupMethod::Perceptual => {
            let img = image::open(&sample.image_path)?;
            Ok(Signature::Perceptual(average_hash(&img)))
        }
    }
}

/// Keep the first sample of every signature group
pub fn dedup_samples(
    samples: Vec<Sample>,
    method: DedupMethod,
    stats: &mut CleaningStats,
) -> Vec<Sample> {
    let signatures: Vec<Result<Signature>> = samples
        .par_iter()
        .map(|sample| compute_signature(sample, method))
        .collect();

    // Lowest index per signature wins regardless of scheduling order
    let first_seen: DashMap<&Signature, usize> = DashMap::new();
    signatures
        .par_iter()
        .enumerate()
        .filter_map(|(index, signature)| signature.as_ref().ok().map(|s| (index, s)))
        .for_each(|(index, signature)| {
            first_seen
                .entry(signature)
                .and_modify(|kept| *kept = (*kept).min(index))
                .or_insert(index);
        });

    let mut kept = Vec::with_capacity(samples.len());
    for (index, (sample, signature)) in samples.iter().zip(&signatures).enumerate() {
        match signature {
            Ok(signature) => {
                let winner = first_seen.get(&signature).map(|entry| *entry.value());
                match winner {
                    Some(winner) if winner != index => {
                        info!(
                            "Removing {}: duplicate of {}",
                            sample.image_name(),
                            samples[winner].image_name()
                        );
                        stats.increment_duplicates();
                    }
                    _ => kept.push(sample.clone()),
                }
            }
            Err(e) => {
                warn!("Removing {}: unreadable image ({})", sample.image_name(), e);
                stats.increment_unreadable();
            }
        }
    }
    kept
}
