use clap::Parser;
use log::{error, info};
use std::fs;
use std::path::Path;

use yolo_curate::config::{
    CleanArgs, CompareArgs, LabelsArgs, ReviewArgs, RunArgs, SplitArgs, TrainArgs,
};
use yolo_curate::conversion::{find_label_id, generate_yolo_labels};
use yolo_curate::metrics::{compare, load_run_metrics, render_report};
use yolo_curate::review::save_review_samples;
use yolo_curate::train::{train, TrainConfig};
use yolo_curate::{
    clean_dataset, run_pipeline, split_dataset, Cli, CleanConfig, Command, Result, RunLayout,
    SplitRatios,
};

fn labels(args: &LabelsArgs) -> Result<()> {
    let label_id = find_label_id(&args.class_descriptions, &args.class_name)?;
    info!("Label ID for '{}': {}", args.class_name, label_id);
    generate_yolo_labels(&args.annotations, &label_id, &args.images_dir)?;
    Ok(())
}

fn clean(args: &CleanArgs) -> Result<()> {
    let config = CleanConfig::from_options(&args.options)?;
    clean_dataset(&args.source, &args.output, &config)?;
    Ok(())
}

fn split(args: &SplitArgs) -> Result<()> {
    let ratios = SplitRatios::new(args.split.train_size, args.split.val_size)?;
    let yaml_path = args
        .split
        .data_yaml
        .clone()
        .unwrap_or_else(|| args.output.join("dataset.yaml"));
    split_dataset(
        &args.source,
        &args.output,
        &ratios,
        args.split.seed,
        &yaml_path,
        &args.split.class_names(),
    )?;
    Ok(())
}

fn run(args: &RunArgs) -> Result<()> {
    let config = args.clean_config()?;
    let ratios = SplitRatios::new(args.split.train_size, args.split.val_size)?;
    let layout = RunLayout::new(&args.output, args.split.data_yaml.as_deref());

    let (stats, split_data) = run_pipeline(&args.source, &layout, &config, &ratios, args.split.seed)?;
    info!(
        "Dataset ready: {} of {} images kept (train: {}, val: {}, test: {})",
        stats.kept,
        stats.total_images,
        split_data.train.len(),
        split_data.val.len(),
        split_data.test.len()
    );
    info!("Train with: yolo-curate train --data {}", layout.data_yaml.display());
    Ok(())
}

fn train_model(args: &TrainArgs) -> Result<()> {
    let config = TrainConfig {
        yolo_bin: args.yolo_bin.clone(),
        model: args.model.clone(),
        epochs: args.epochs,
        imgsz: args.imgsz,
        batch: args.batch,
        project: args.project.clone(),
        evaluate_test: !args.skip_test,
        ..TrainConfig::new(&args.data, &args.name)
    };
    train(&config)
}

fn compare_runs(args: &CompareArgs) -> Result<()> {
    let baseline = load_run_metrics(&args.baseline)?;
    let candidate = load_run_metrics(&args.candidate)?;
    let rows = compare(&baseline, &candidate);
    let report = render_report(&args.baseline_label, &args.candidate_label, &rows);
    print!("{}", report);

    if let Some(output) = &args.output {
        write_report_file(output, &report)?;
        info!("Comparison saved to: {}", output.display());
    }
    Ok(())
}

fn write_report_file(path: &Path, report: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, report)?;
    Ok(())
}

fn review(args: &ReviewArgs) -> Result<()> {
    let written = save_review_samples(&args.source, &args.output, args.count, args.seed)?;
    info!("Saved {} annotated samples to {}", written.len(), args.output.display());
    Ok(())
}

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let outcome = match &cli.command {
        Command::Labels(args) => labels(args),
        Command::Clean(args) => clean(args),
        Command::Split(args) => split(args),
        Command::Run(args) => run(args),
        Command::Train(args) => train_model(args),
        Command::Compare(args) => compare_runs(args),
        Command::Review(args) => review(args),
    };

    if let Err(e) = outcome {
        error!("{}", e);
        std::process::exit(1);
    }
}
