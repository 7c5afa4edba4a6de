//! Cleaning pipeline: validate -> brightness filter -> dedup -> enhance.

use log::{error, info};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::config::CleanConfig;
use crate::dataset::{split_into, SplitRatios};
use crate::dedup::dedup_samples;
use crate::enhance::write_samples;
use crate::error::{Error, Result};
use crate::io::collect_samples;
use crate::quality::filter_samples;
use crate::types::{CleaningStats, Sample, SplitData};
use crate::utils::{create_output_directory, create_progress_bar, output_overlaps_source};
use crate::validate::{validate_samples, BoxRules};

// Written next to the cleaned images
pub const CLEANING_REPORT_FILE: &str = "cleaning_report.json";

/// Result of a cleaning run
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub stats: CleaningStats,
    /// Samples as written to the output directory
    pub samples: Vec<Sample>,
}

/// Run the filtering stages over `samples`, returning the survivors.
///
/// Nothing is written; counters for every removal are added to `stats`.
pub fn filter_dataset(
    samples: Vec<Sample>,
    config: &CleanConfig,
    stats: &mut CleaningStats,
) -> Vec<Sample> {
    let rules = BoxRules {
        num_classes: config.num_classes(),
        tolerance: config.bbox_tolerance,
    };

    info!("Validating bounding boxes...");
    let samples = validate_samples(samples, &rules, stats);

    info!("Checking image brightness...");
    let samples = filter_samples(samples, &config.brightness, stats);

    info!("Removing duplicates ({:?})...", config.dedup);
    dedup_samples(samples, config.dedup, stats)
}

/// Clean `source` into `output`, writing images, labels and a JSON report.
///
/// Fails with [`Error::EmptyDataset`] when no sample survives; the report is
/// still written in that case.
pub fn clean_dataset(source: &Path, output: &Path, config: &CleanConfig) -> Result<CleanOutcome> {
    config.validate()?;
    if !source.is_dir() {
        return Err(Error::InvalidConfig(format!(
            "source directory not found: {}",
            source.display()
        )));
    }
    let labels_dir = config.labels_dir.as_deref().unwrap_or(source);
    ensure_inputs_kept(output, &[source, labels_dir])?;

    let samples = collect_samples(source, labels_dir)?;
    info!("Found {} images in {}", samples.len(), source.display());

    let mut stats = CleaningStats::new(samples.len());
    let survivors = filter_dataset(samples, config, &mut stats);

    create_output_directory(output)?;

    if config.enhance.enabled {
        info!(
            "Enhancing {} images (brightness {}, contrast {}, sharpen {})...",
            survivors.len(),
            config.enhance.brightness,
            config.enhance.contrast,
            config.enhance.sharpen
        );
    } else {
        info!("Copying {} images without enhancement...", survivors.len());
    }
    let pb = create_progress_bar(survivors.len() as u64, "Clean");
    let outcomes = write_samples(&survivors, output, &config.enhance, &pb);
    pb.finish_with_message("Cleaning complete");

    let mut written = Vec::with_capacity(survivors.len());
    for (sample, outcome) in survivors.iter().zip(outcomes) {
        match outcome {
            Ok(enhanced) => {
                stats.kept += 1;
                if enhanced {
                    stats.enhanced += 1;
                }
                written.push(Sample::from_image(output.join(sample.image_name()), output));
            }
            Err(e) => {
                error!("Failed to write {}: {}", sample.image_name(), e);
                stats.increment_write_failed();
            }
        }
    }

    write_report(&output.join(CLEANING_REPORT_FILE), &stats)?;
    stats.print_summary();
    info!("Cleaned dataset saved to: {}", output.display());

    if written.is_empty() {
        return Err(Error::EmptyDataset(format!(
            "no images left after cleaning {}",
            source.display()
        )));
    }

    Ok(CleanOutcome {
        stats,
        samples: written,
    })
}

/// Refuse an output directory whose recreation would delete one of `inputs`
fn ensure_inputs_kept(output: &Path, inputs: &[&Path]) -> Result<()> {
    match inputs
        .iter()
        .find(|input| output_overlaps_source(input, output))
    {
        Some(input) => Err(Error::InvalidConfig(format!(
            "output {} would overwrite the input {}",
            output.display(),
            input.display()
        ))),
        None => Ok(()),
    }
}

/// Serialize the cleaning statistics as pretty JSON
pub fn write_report(path: &Path, stats: &CleaningStats) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, stats)?;
    Ok(())
}

/// Read back a report written by [`write_report`]
pub fn read_report(path: &Path) -> Result<CleaningStats> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Paths used by a full `run`
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub cleaned_dir: PathBuf,
    pub splits_dir: PathBuf,
    pub data_yaml: PathBuf,
}

impl RunLayout {
    pub fn new(output: &Path, data_yaml: Option<&Path>) -> Self {
        Self {
            cleaned_dir: output.join("cleaned"),
            splits_dir: output.join("splits"),
            data_yaml: data_yaml
                .map(Path::to_path_buf)
                .unwrap_or_else(|| output.join("dataset.yaml")),
        }
    }
}

/// Clean, split and write the dataset descriptor
pub fn run_pipeline(
    source: &Path,
    layout: &RunLayout,
    config: &CleanConfig,
    ratios: &SplitRatios,
    seed: u64,
) -> Result<(CleaningStats, SplitData)> {
    let labels_dir = config.labels_dir.as_deref().unwrap_or(source);
    ensure_inputs_kept(&layout.splits_dir, &[source, labels_dir])?;

    let outcome = clean_dataset(source, &layout.cleaned_dir, config)?;
    let split_data = split_into(
        outcome.samples,
        &layout.splits_dir,
        ratios,
        seed,
        &layout.data_yaml,
        &config.class_names,
    )?;
    Ok((outcome.stats, split_data))
}
