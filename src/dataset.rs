use log::{error, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::io::{collect_pairs, copy_pair, create_dataset_yaml};
use crate::types::{OutputDirs, Sample, SplitData};
use crate::utils::{create_output_directory, create_progress_bar, output_overlaps_source};

/// Fractions of the dataset assigned to train and val; test takes the rest
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.7,
            val: 0.15,
        }
    }
}

impl SplitRatios {
    pub fn new(train: f64, val: f64) -> Result<Self> {
        let ratios = Self { train, val };
        ratios.validate()?;
        Ok(ratios)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.train > 0.0 && self.train < 1.0 && self.val > 0.0 && self.val < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "split ratios must be in (0, 1), got train={} val={}",
                self.train, self.val
            )));
        }
        if self.train + self.val >= 1.0 {
            return Err(Error::InvalidConfig(format!(
                "train + val must be < 1, got {}",
                self.train + self.val
            )));
        }
        Ok(())
    }

    pub fn test(&self) -> f64 {
        1.0 - self.train - self.val
    }
}

/// Shuffle the samples with a fixed seed and split them into train/val/test
pub fn split_samples(mut samples: Vec<Sample>, ratios: &SplitRatios, seed: u64) -> SplitData {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let train_size = (total as f64 * ratios.train).floor() as usize;
    let val_size = (total as f64 * ratios.val).floor() as usize;

    let test = samples.split_off(train_size + val_size);
    let val = samples.split_off(train_size);
    let train = samples;

    SplitData { train, val, test }
}

/// Set up `<root>/{train,val,test}/{images,labels}`, replacing any previous run
pub fn setup_output_directories(output_root: &Path) -> std::io::Result<OutputDirs> {
    for split in ["train", "val", "test"] {
        create_output_directory(&output_root.join(split))?;
    }

    let dir = |split: &str, kind: &str| -> std::io::Result<PathBuf> {
        create_output_directory(&output_root.join(split).join(kind))
    };

    Ok(OutputDirs {
        train_images_dir: dir("train", "images")?,
        train_labels_dir: dir("train", "labels")?,
        val_images_dir: dir("val", "images")?,
        val_labels_dir: dir("val", "labels")?,
        test_images_dir: dir("test", "images")?,
        test_labels_dir: dir("test", "labels")?,
    })
}

/// Copy one split's pairs in parallel
fn copy_split(samples: &[Sample], images_dir: &Path, labels_dir: &Path, label: &str) -> Result<()> {
    let pb = create_progress_bar(samples.len() as u64, label);
    let failures: Vec<String> = samples
        .par_iter()
        .filter_map(|sample| {
            let outcome = copy_pair(sample, images_dir, labels_dir);
            pb.inc(1);
            outcome.err().map(|e| {
                error!("Failed to copy {}: {}", sample.image_name(), e);
                sample.image_name()
            })
        })
        .collect();
    pb.finish_with_message(format!("{} split complete", label));

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Io(std::io::Error::other(format!(
            "failed to copy {} file(s) into {}: {}",
            failures.len(),
            images_dir.display(),
            failures.join(", ")
        ))))
    }
}

/// Copy every split into its directory tree
pub fn process_split(split_data: &SplitData, output_dirs: &OutputDirs) -> Result<()> {
    copy_split(
        &split_data.train,
        &output_dirs.train_images_dir,
        &output_dirs.train_labels_dir,
        "Train",
    )?;
    copy_split(
        &split_data.val,
        &output_dirs.val_images_dir,
        &output_dirs.val_labels_dir,
        "Val",
    )?;
    copy_split(
        &split_data.test,
        &output_dirs.test_images_dir,
        &output_dirs.test_labels_dir,
        "Test",
    )
}

/// Split an in-memory sample set into `output_root` and write the descriptor
pub fn split_into(
    samples: Vec<Sample>,
    output_root: &Path,
    ratios: &SplitRatios,
    seed: u64,
    yaml_path: &Path,
    names: &[String],
) -> Result<SplitData> {
    ratios.validate()?;
    if samples.is_empty() {
        return Err(Error::EmptyDataset("no samples left to split".to_string()));
    }

    let split_data = split_samples(samples, ratios, seed);
    info!(
        "Total pairs: {} (train: {}, val: {}, test: {})",
        split_data.total(),
        split_data.train.len(),
        split_data.val.len(),
        split_data.test.len()
    );

    let output_dirs = setup_output_directories(output_root)?;
    process_split(&split_data, &output_dirs)?;

    info!("Creating {}...", yaml_path.display());
    create_dataset_yaml(yaml_path, output_root, names)?;
    info!("Split completed under: {}", output_root.display());

    Ok(split_data)
}

/// Split an image/label directory into `output_root` and write the descriptor
pub fn split_dataset(
    source: &Path,
    output_root: &Path,
    ratios: &SplitRatios,
    seed: u64,
    yaml_path: &Path,
    names: &[String],
) -> Result<SplitData> {
    if output_overlaps_source(source, output_root) {
        return Err(Error::InvalidConfig(format!(
            "split output {} would overwrite the source {}",
            output_root.display(),
            source.display()
        )));
    }
    let pairs = collect_pairs(source)?;
    info!("Found {} image/label pairs in {}", pairs.len(), source.display());
    split_into(pairs, output_root, ratios, seed, yaml_path, names)
}
