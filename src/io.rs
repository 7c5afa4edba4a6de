use glob::{glob_with, MatchOptions};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, copy, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{is_image_path, Sample};

/// Collect every image directly inside `dir`, sorted by file name.
///
/// Each image is paired with `<stem>.txt` in `labels_dir`; the label may not
/// exist, which the validator reports as a missing label.
pub fn collect_samples(dir: &Path, labels_dir: &Path) -> Result<Vec<Sample>> {
    let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut image_paths: Vec<PathBuf> = glob_with(&pattern, options)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to read directory entry: {}", e);
                None
            }
        })
        .filter(|path| path.is_file() && is_image_path(path))
        .collect();
    image_paths.sort_by_key(|path| path.file_name().map(|name| name.to_os_string()));

    Ok(image_paths
        .into_iter()
        .map(|image_path| Sample::from_image(image_path, labels_dir))
        .collect())
}

/// Collect image/label pairs, skipping images without a label file
pub fn collect_pairs(dir: &Path) -> Result<Vec<Sample>> {
    let samples = collect_samples(dir, dir)?;
    if samples.is_empty() {
        return Err(Error::EmptyDataset(format!(
            "no images found in {}",
            dir.display()
        )));
    }

    let pairs: Vec<Sample> = samples
        .into_iter()
        .filter(|sample| {
            let exists = sample.label_path.is_file();
            if !exists {
                debug!("Skipping {}: no label file", sample.image_name());
            }
            exists
        })
        .collect();

    if pairs.is_empty() {
        return Err(Error::EmptyDataset(format!(
            "no image/label pairs found in {}",
            dir.display()
        )));
    }
    Ok(pairs)
}

/// Copy an image and its label into the given directories, keeping file names
pub fn copy_pair(sample: &Sample, images_dir: &Path, labels_dir: &Path) -> std::io::Result<()> {
    copy(&sample.image_path, images_dir.join(sample.image_name()))?;
    if let Some(label_name) = sample.label_path.file_name() {
        copy(&sample.label_path, labels_dir.join(label_name))?;
    }
    Ok(())
}

/// Create the dataset.yaml file for YOLO training
pub fn create_dataset_yaml(yaml_path: &Path, dataset_root: &Path, names: &[String]) -> Result<()> {
    if let Some(parent) = yaml_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let descriptor = DatasetDescriptor {
        path: fs::canonicalize(dataset_root)?,
        train: PathBuf::from("train/images"),
        val: PathBuf::from("val/images"),
        test: Some(PathBuf::from("test/images")),
        names: names.iter().cloned().enumerate().collect(),
    };
    let mut dataset_yaml = BufWriter::new(File::create(yaml_path)?);
    serde_yaml::to_writer(&mut dataset_yaml, &descriptor)?;
    dataset_yaml.flush()?;
    Ok(())
}

/// The dataset descriptor consumed by the trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub path: PathBuf,
    pub train: PathBuf,
    pub val: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<PathBuf>,
    pub names: BTreeMap<usize, String>,
}

impl DatasetDescriptor {
    pub fn load(yaml_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(yaml_path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn train_images_dir(&self) -> PathBuf {
        self.path.join(&self.train)
    }

    pub fn val_images_dir(&self) -> PathBuf {
        self.path.join(&self.val)
    }

    pub fn test_images_dir(&self) -> Option<PathBuf> {
        self.test.as_ref().map(|test| self.path.join(test))
    }
}

/// Count the supported images directly inside `dir`
pub fn count_images(dir: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_path(&path) {
            count += 1;
        }
    }
    Ok(count)
}
