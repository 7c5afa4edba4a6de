mod common;

use common::*;
use image::Rgb;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

use yolo_curate::conversion::{find_label_id, generate_yolo_labels};
use yolo_curate::io::{count_images, create_dataset_yaml, DatasetDescriptor};
use yolo_curate::metrics::{compare, load_run_metrics, render_report, RunMetrics};
use yolo_curate::pipeline::{read_report, CLEANING_REPORT_FILE};
use yolo_curate::review::{draw_sample, pixel_rect, save_review_samples};
use yolo_curate::train::{check_dataset, train, TrainConfig};
use yolo_curate::{
    clean_dataset, run_pipeline, split_dataset, split_samples, BoundingBox, CleanConfig, Error,
    InvalidReason, RunLayout, Sample, SplitRatios,
};

/// Ten samples: six good, two bad labels, one black image, one duplicate
fn build_mixed_dataset(dir: &std::path::Path) {
    for (i, level) in [60u8, 80, 100, 120, 140, 160].into_iter().enumerate() {
        write_valid_sample(dir, &format!("img_{:02}", i), level);
    }
    write_solid_png(dir, "img_06.png", [90, 90, 90]);
    write_label(dir, "img_06", "0 0.950000 0.500000 0.200000 0.200000\n");
    write_solid_png(dir, "img_07.png", [110, 110, 110]);
    write_label(dir, "img_07", "3 0.500000 0.500000 0.200000 0.200000\n");
    write_valid_sample(dir, "img_08", 0);
    fs::copy(dir.join("img_00.png"), dir.join("img_09.png")).unwrap();
    write_label(dir, "img_09", VALID_LABEL);
}

fn stems(samples: &[Sample]) -> HashSet<String> {
    samples.iter().map(Sample::stem).collect()
}

#[test]
fn test_clean_dataset_counts_every_removal() {
    let source = tempdir().unwrap();
    let output = tempdir().unwrap();
    build_mixed_dataset(source.path());
    let cleaned = output.path().join("cleaned");

    let outcome = clean_dataset(source.path(), &cleaned, &CleanConfig::default()).unwrap();
    let stats = &outcome.stats;

    assert_eq!(stats.total_images, 10);
    assert_eq!(stats.invalid_bbox_removed, 2);
    assert_eq!(stats.invalid_reasons.get(&InvalidReason::Geometry), Some(&1));
    assert_eq!(stats.invalid_reasons.get(&InvalidReason::ClassOutOfRange), Some(&1));
    assert_eq!(stats.too_dark_removed, 1);
    assert_eq!(stats.duplicates_removed, 1);
    assert_eq!(stats.kept, 6);
    assert_eq!(stats.enhanced, 6);
    assert_eq!(stats.total_removed(), 4);

    let expected: Vec<String> = (0..6).map(|i| format!("img_{:02}.png", i)).collect();
    assert_eq!(file_names(&cleaned, "png"), expected);
    assert_eq!(file_names(&cleaned, "txt").len(), 6);

    let report = read_report(&cleaned.join(CLEANING_REPORT_FILE)).unwrap();
    assert_eq!(&report, stats);
}

#[test]
fn test_clean_without_enhancement_copies_bytes() {
    let source = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_valid_sample(source.path(), "laptop", 128);

    let mut config = CleanConfig::default();
    config.enhance.enabled = false;
    let outcome = clean_dataset(source.path(), output.path(), &config).unwrap();

    assert_eq!(outcome.stats.enhanced, 0);
    assert_eq!(
        fs::read(source.path().join("laptop.png")).unwrap(),
        fs::read(output.path().join("laptop.png")).unwrap()
    );
    assert_eq!(
        fs::read_to_string(output.path().join("laptop.txt")).unwrap(),
        VALID_LABEL
    );
}

#[test]
fn test_clean_with_no_survivors_fails() {
    let source = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_valid_sample(source.path(), "dark", 5);

    let result = clean_dataset(source.path(), output.path(), &CleanConfig::default());
    assert!(matches!(result, Err(Error::EmptyDataset(_))));
    assert!(output.path().join(CLEANING_REPORT_FILE).is_file());
}

#[test]
fn test_clean_refuses_to_overwrite_source() {
    let source = tempdir().unwrap();
    write_valid_sample(source.path(), "laptop", 128);

    let result = clean_dataset(source.path(), source.path(), &CleanConfig::default());
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert!(source.path().join("laptop.png").is_file());
}

#[test]
fn test_clean_refuses_to_overwrite_labels_dir() {
    let images = tempdir().unwrap();
    let labels = tempdir().unwrap();
    write_solid_png(images.path(), "a.png", [128, 128, 128]);
    write_label(labels.path(), "a", VALID_LABEL);

    let config = CleanConfig {
        labels_dir: Some(labels.path().to_path_buf()),
        ..CleanConfig::default()
    };
    let result = clean_dataset(images.path(), labels.path(), &config);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert_eq!(
        fs::read_to_string(labels.path().join("a.txt")).unwrap(),
        VALID_LABEL
    );
}

#[test]
fn test_run_refuses_splits_over_labels_dir() {
    let images = tempdir().unwrap();
    let work = tempdir().unwrap();
    let labels = work.path().join("splits");
    fs::create_dir_all(&labels).unwrap();
    write_solid_png(images.path(), "a.png", [128, 128, 128]);
    write_label(&labels, "a", VALID_LABEL);

    let config = CleanConfig {
        labels_dir: Some(labels.clone()),
        ..CleanConfig::default()
    };
    let layout = RunLayout::new(work.path(), None);
    let result = run_pipeline(
        images.path(),
        &layout,
        &config,
        &SplitRatios::default(),
        42,
    );
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert!(labels.join("a.txt").is_file());
}

#[test]
fn test_dotted_stems_keep_their_own_labels() {
    let source = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_solid_png(source.path(), "img.a.png", [100, 100, 100]);
    write_solid_png(source.path(), "img.b.png", [120, 120, 120]);
    write_label(source.path(), "img.a", VALID_LABEL);
    write_label(source.path(), "img.b", "0 0.250000 0.250000 0.100000 0.100000\n");
    // Would be picked up for both images if stems were cut at the last dot
    write_label(source.path(), "img", "5 0.5 0.5 0.2 0.2\n");

    let mut config = CleanConfig::default();
    config.enhance.enabled = false;
    let outcome = clean_dataset(source.path(), output.path(), &config).unwrap();

    assert_eq!(outcome.stats.kept, 2);
    assert_eq!(
        fs::read_to_string(output.path().join("img.b.txt")).unwrap(),
        "0 0.250000 0.250000 0.100000 0.100000\n"
    );
    assert!(!output.path().join("img.txt").exists());
}

#[test]
fn test_descriptor_round_trips_special_class_names() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("splits");
    fs::create_dir_all(&root).unwrap();
    let yaml = dir.path().join("dataset.yaml");
    let names = vec![
        "Laptop: 15\"".to_string(),
        "#refurbished".to_string(),
        "Tablet".to_string(),
    ];

    create_dataset_yaml(&yaml, &root, &names).unwrap();
    let descriptor = DatasetDescriptor::load(&yaml).unwrap();

    let loaded: Vec<String> = descriptor.names.values().cloned().collect();
    assert_eq!(loaded, names);
    assert_eq!(descriptor.train, PathBuf::from("train/images"));
    assert_eq!(descriptor.test, Some(PathBuf::from("test/images")));
}

#[test]
fn test_separate_labels_dir() {
    let images = tempdir().unwrap();
    let labels = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_solid_png(images.path(), "a.png", [128, 128, 128]);
    write_solid_png(images.path(), "b.png", [100, 100, 100]);
    write_label(labels.path(), "a", VALID_LABEL);

    let config = CleanConfig {
        labels_dir: Some(labels.path().to_path_buf()),
        ..CleanConfig::default()
    };
    let outcome = clean_dataset(images.path(), output.path(), &config).unwrap();

    assert_eq!(outcome.stats.kept, 1);
    assert_eq!(
        outcome.stats.invalid_reasons.get(&InvalidReason::MissingLabel),
        Some(&1)
    );
    assert!(output.path().join("a.txt").is_file());
}

#[test]
fn test_split_samples_sizes_and_determinism() {
    let samples: Vec<Sample> = (0..10)
        .map(|i| Sample::from_image(PathBuf::from(format!("img{}.jpg", i)), &PathBuf::from(".")))
        .collect();
    let ratios = SplitRatios::default();

    let split = split_samples(samples.clone(), &ratios, 42);
    assert_eq!(split.train.len(), 7);
    assert_eq!(split.val.len(), 1);
    assert_eq!(split.test.len(), 2);
    assert_eq!(split.total(), 10);

    let train = stems(&split.train);
    let val = stems(&split.val);
    let test = stems(&split.test);
    assert!(train.is_disjoint(&val));
    assert!(train.is_disjoint(&test));
    assert!(val.is_disjoint(&test));

    let again = split_samples(samples, &ratios, 42);
    assert_eq!(again.train, split.train);
    assert_eq!(again.test, split.test);
}

#[test]
fn test_split_ratios_are_validated() {
    assert!(SplitRatios::new(0.7, 0.15).is_ok());
    assert!(SplitRatios::new(0.8, 0.2).is_err());
    assert!(SplitRatios::new(0.0, 0.2).is_err());
}

#[test]
fn test_split_dataset_writes_layout_and_descriptor() {
    let source = tempdir().unwrap();
    let output = tempdir().unwrap();
    for i in 0..20 {
        write_valid_sample(source.path(), &format!("img_{:02}", i), 100);
    }
    // Images without labels are not part of the split
    write_solid_png(source.path(), "unlabeled.png", [100, 100, 100]);

    let root = output.path().join("splits");
    let yaml = output.path().join("dataset.yaml");
    let names = vec!["Laptop".to_string()];
    let split = split_dataset(
        source.path(),
        &root,
        &SplitRatios::default(),
        42,
        &yaml,
        &names,
    )
    .unwrap();

    assert_eq!((split.train.len(), split.val.len(), split.test.len()), (14, 3, 3));
    for (name, expected) in [("train", 14), ("val", 3), ("test", 3)] {
        assert_eq!(file_names(&root.join(name).join("images"), "png").len(), expected);
        assert_eq!(file_names(&root.join(name).join("labels"), "txt").len(), expected);
    }

    let descriptor = DatasetDescriptor::load(&yaml).unwrap();
    assert_eq!(descriptor.path, fs::canonicalize(&root).unwrap());
    assert_eq!(descriptor.names.get(&0).map(String::as_str), Some("Laptop"));
    assert_eq!(count_images(&descriptor.train_images_dir()).unwrap(), 14);
    assert_eq!(count_images(&descriptor.test_images_dir().unwrap()).unwrap(), 3);
}

#[test]
fn test_run_pipeline_end_to_end() {
    let source = tempdir().unwrap();
    let output = tempdir().unwrap();
    build_mixed_dataset(source.path());

    let layout = RunLayout::new(output.path(), None);
    let (stats, split) = run_pipeline(
        source.path(),
        &layout,
        &CleanConfig::default(),
        &SplitRatios::default(),
        42,
    )
    .unwrap();

    assert_eq!(stats.kept, 6);
    assert_eq!(split.total(), 6);
    assert_eq!((split.train.len(), split.val.len(), split.test.len()), (4, 0, 2));
    assert!(layout.data_yaml.is_file());

    // Split samples point at the cleaned copies
    for sample in split.train.iter().chain(&split.test) {
        assert!(sample.image_path.starts_with(&layout.cleaned_dir));
    }

    let descriptor = check_dataset(&layout.data_yaml).unwrap();
    assert_eq!(count_images(&descriptor.train_images_dir()).unwrap(), 4);
}

#[test]
fn test_check_dataset_rejects_empty_train_split() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("splits");
    fs::create_dir_all(root.join("train").join("images")).unwrap();
    let yaml = dir.path().join("dataset.yaml");
    fs::write(
        &yaml,
        format!(
            "path: {}\ntrain: train/images\nval: val/images\n\nnames:\n    0: Laptop\n",
            root.display()
        ),
    )
    .unwrap();

    assert!(matches!(check_dataset(&yaml), Err(Error::EmptyDataset(_))));
    assert!(matches!(
        check_dataset(&dir.path().join("missing.yaml")),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_train_arguments() {
    let config = TrainConfig::new("data/dataset.yaml", "yolov8n-laptop");
    assert_eq!(
        config.train_args(),
        vec![
            "detect",
            "train",
            "data=data/dataset.yaml",
            "model=yolov8n.pt",
            "epochs=50",
            "imgsz=640",
            "batch=16",
            "project=runs",
            "name=yolov8n-laptop",
        ]
    );
    assert_eq!(
        config.best_weights(),
        PathBuf::from("runs/yolov8n-laptop/weights/best.pt")
    );
    assert!(config.val_args().contains(&"split=test".to_string()));
    assert!(config
        .val_args()
        .contains(&"model=runs/yolov8n-laptop/weights/best.pt".to_string()));
}

#[test]
fn test_train_reports_missing_tool() {
    let source = tempdir().unwrap();
    let output = tempdir().unwrap();
    for i in 0..10 {
        write_valid_sample(source.path(), &format!("img_{:02}", i), 100);
    }
    let yaml = output.path().join("dataset.yaml");
    split_dataset(
        source.path(),
        &output.path().join("splits"),
        &SplitRatios::default(),
        42,
        &yaml,
        &["Laptop".to_string()],
    )
    .unwrap();

    let config = TrainConfig {
        yolo_bin: "yolo-curate-missing-trainer".to_string(),
        ..TrainConfig::new(&yaml, "missing")
    };
    assert!(matches!(train(&config), Err(Error::Io(_))));
}

#[test]
fn test_open_images_conversion() {
    let dir = tempdir().unwrap();
    let images = dir.path().join("images");
    fs::create_dir_all(&images).unwrap();
    fs::write(images.join("img1.jpg"), b"jpg").unwrap();
    fs::write(images.join("img2.jpg"), b"jpg").unwrap();
    fs::write(images.join("img2.txt"), "stale").unwrap();

    let classes = dir.path().join("class-descriptions-boxable.csv");
    fs::write(&classes, "/m/01c648,Laptop\n/m/01yrx,Cat\n").unwrap();
    let annotations = dir.path().join("train-annotations-bbox.csv");
    fs::write(
        &annotations,
        "ImageID,Source,LabelName,Confidence,XMin,XMax,YMin,YMax,IsOccluded\n\
         img1,xclick,/m/01c648,1,0.25,0.75,0.5,1.0,0\n\
         img1,xclick,/m/01c648,1,0.0,1.0,0.0,1.0,0\n\
         img2,xclick,/m/01yrx,1,0.1,0.2,0.1,0.2,0\n\
         img3,xclick,/m/01c648,1,0.1,0.2,0.1,0.2,0\n",
    )
    .unwrap();

    let label_id = find_label_id(&classes, "laptop").unwrap();
    assert_eq!(label_id, "/m/01c648");
    assert!(matches!(
        find_label_id(&classes, "Tablet"),
        Err(Error::ClassNotFound { .. })
    ));

    let stats = generate_yolo_labels(&annotations, &label_id, &images).unwrap();
    assert_eq!(stats.images, 1);
    assert_eq!(stats.boxes, 2);
    assert_eq!(
        fs::read_to_string(images.join("img1.txt")).unwrap(),
        "0 0.500000 0.750000 0.500000 0.500000\n0 0.500000 0.500000 1.000000 1.000000\n"
    );
    assert!(!images.join("img2.txt").exists());
    assert!(!images.join("img3.txt").exists());
}

#[test]
fn test_open_images_dotted_image_id() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("0a1b.v2.jpg"), b"jpg").unwrap();
    let annotations = dir.path().join("annotations.csv");
    fs::write(
        &annotations,
        "ImageID,LabelName,XMin,XMax,YMin,YMax\n0a1b.v2,/m/01c648,0.0,1.0,0.0,1.0\n",
    )
    .unwrap();

    let stats = generate_yolo_labels(&annotations, "/m/01c648", dir.path()).unwrap();
    assert_eq!(stats.images, 1);
    assert!(dir.path().join("0a1b.v2.txt").is_file());
    assert!(!dir.path().join("0a1b.txt").exists());
}

#[test]
fn test_metrics_from_csv_and_json() {
    let dir = tempdir().unwrap();
    let run = dir.path().join("baseline");
    fs::create_dir_all(&run).unwrap();
    fs::write(
        run.join("results.csv"),
        "                  epoch,   metrics/precision(B),      metrics/recall(B),       metrics/mAP50(B),    metrics/mAP50-95(B)\n\
         1,0.1,0.2,0.3,0.1\n\
         2,0.5,0.5,0.5,0.25\n",
    )
    .unwrap();
    let baseline = load_run_metrics(&run).unwrap();
    assert_eq!(
        baseline,
        RunMetrics {
            precision: 0.5,
            recall: 0.5,
            map50: 0.5,
            map50_95: 0.25,
        }
    );

    let json = dir.path().join("results.json");
    fs::write(
        &json,
        r#"[{"metrics/precision(B)": 0.1, "metrics/recall(B)": 0.1, "metrics/mAP50(B)": 0.1, "metrics/mAP50-95(B)": 0.1},
            {"metrics/precision(B)": 0.75, "metrics/recall(B)": 0.5, "metrics/mAP50(B)": 0.25, "metrics/mAP50-95(B)": 0.25}]"#,
    )
    .unwrap();
    let candidate = load_run_metrics(&json).unwrap();
    assert_eq!(candidate.precision, 0.75);

    let rows = compare(&baseline, &candidate);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].metric, "Precision");
    assert_eq!(rows[0].diff, 0.25);
    assert_eq!(rows[0].diff_pct, 50.0);
    assert_eq!(rows[2].diff, -0.25);

    let report = render_report("Original Dataset", "Cleaned Dataset", &rows);
    assert!(report.contains("MODEL PERFORMANCE COMPARISON"));
    assert!(report.contains("+0.250 (+50.0%)"));
    assert!(report.contains("-0.250 (-50.0%)"));
}

#[test]
fn test_metrics_missing_column() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("results.csv");
    fs::write(&csv, "epoch,metrics/precision(B)\n1,0.5\n").unwrap();
    assert!(matches!(
        load_run_metrics(&csv),
        Err(Error::MissingMetric { .. })
    ));
}

#[test]
fn test_review_draws_boxes() {
    let dir = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_solid_png(dir.path(), "a.png", [0, 0, 0]);
    write_label(dir.path(), "a", "0 0.5 0.5 0.5 0.5\n");

    let bbox = BoundingBox {
        class_id: 0,
        x_center: 0.5,
        y_center: 0.5,
        width: 0.5,
        height: 0.5,
    };
    let rect = pixel_rect(&bbox, 16, 16).unwrap();
    assert_eq!((rect.left(), rect.top(), rect.width(), rect.height()), (4, 4, 8, 8));

    let sample = Sample::from_image(dir.path().join("a.png"), dir.path());
    let annotated = output.path().join("a_check.png");
    assert_eq!(draw_sample(&sample, &annotated).unwrap(), 1);
    let img = image::open(&annotated).unwrap().to_rgb8();
    assert_eq!(img.get_pixel(4, 8), &Rgb([0, 255, 0]));
    assert_eq!(img.get_pixel(8, 8), &Rgb([0, 0, 0]));
}

#[test]
fn test_save_review_samples() {
    let dir = tempdir().unwrap();
    let output = tempdir().unwrap();
    for i in 0..5 {
        write_valid_sample(dir.path(), &format!("img_{}", i), 100);
    }

    let written = save_review_samples(dir.path(), output.path(), 3, 42).unwrap();
    assert_eq!(written.len(), 3);
    for path in &written {
        assert!(path.is_file());
        assert!(path.to_string_lossy().ends_with("_bboxes.jpg"));
    }

    let all = save_review_samples(dir.path(), output.path(), 50, 42).unwrap();
    assert_eq!(all.len(), 5);
}
