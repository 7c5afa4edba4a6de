//! Comparison of the final metrics of two training runs

use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const RESULTS_CSV: &str = "results.csv";
const RESULTS_JSON: &str = "results.json";

// Column names used by the Ultralytics results files, paired with report labels
const METRIC_KEYS: [(&str, &str); 4] = [
    ("metrics/precision(B)", "Precision"),
    ("metrics/recall(B)", "Recall"),
    ("metrics/mAP50(B)", "mAP@0.5"),
    ("metrics/mAP50-95(B)", "mAP@0.5:0.95"),
];

/// Final-epoch detection metrics of one run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunMetrics {
    pub precision: f64,
    pub recall: f64,
    pub map50: f64,
    pub map50_95: f64,
}

impl RunMetrics {
    fn from_lookup(path: &Path, lookup: impl Fn(&str) -> Option<f64>) -> Result<Self> {
        let mut values = [0.0f64; 4];
        for (value, (key, _)) in values.iter_mut().zip(METRIC_KEYS) {
            *value = lookup(key).ok_or_else(|| Error::MissingMetric {
                metric: key.to_string(),
                path: path.to_path_buf(),
            })?;
        }
        let [precision, recall, map50, map50_95] = values;
        Ok(Self {
            precision,
            recall,
            map50,
            map50_95,
        })
    }

    fn values(&self) -> [f64; 4] {
        [self.precision, self.recall, self.map50, self.map50_95]
    }
}

fn resolve_results_file(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    for name in [RESULTS_CSV, RESULTS_JSON] {
        let candidate = path.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(Error::InvalidConfig(format!(
        "no {} or {} found in {}",
        RESULTS_CSV,
        RESULTS_JSON,
        path.display()
    )))
}

/// Read the last epoch of an Ultralytics `results.csv`
pub fn read_results_csv(path: &Path) -> Result<RunMetrics> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut last = None;
    for record in reader.records() {
        last = Some(record?);
    }
    let last = last
        .ok_or_else(|| Error::InvalidConfig(format!("no epochs in {}", path.display())))?;

    let row: HashMap<&str, f64> = headers
        .iter()
        .zip(last.iter())
        .filter_map(|(key, value)| value.parse().ok().map(|v| (key, v)))
        .collect();
    RunMetrics::from_lookup(path, |key| row.get(key).copied())
}

/// Read the last epoch of a `results.json` array of epoch objects
pub fn read_results_json(path: &Path) -> Result<RunMetrics> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    let last = match &value {
        Value::Array(epochs) => epochs.last(),
        Value::Object(_) => Some(&value),
        _ => None,
    }
    .ok_or_else(|| Error::InvalidConfig(format!("no epochs in {}", path.display())))?;

    RunMetrics::from_lookup(path, |key| last.get(key).and_then(Value::as_f64))
}

/// Load metrics from a run directory or a results file
pub fn load_run_metrics(path: &Path) -> Result<RunMetrics> {
    let file = resolve_results_file(path)?;
    match file.extension().and_then(|ext| ext.to_str()) {
        Some("json") => read_results_json(&file),
        _ => read_results_csv(&file),
    }
}

/// One labeled row of the comparison table
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub metric: &'static str,
    pub baseline: f64,
    pub candidate: f64,
    pub diff: f64,
    pub diff_pct: f64,
}

pub fn compare(baseline: &RunMetrics, candidate: &RunMetrics) -> Vec<MetricRow> {
    METRIC_KEYS
        .iter()
        .zip(baseline.values().into_iter().zip(candidate.values()))
        .map(|(&(_, metric), (baseline, candidate))| {
            let diff = candidate - baseline;
            let diff_pct = if baseline > 0.0 {
                diff / baseline * 100.0
            } else {
                0.0
            };
            MetricRow {
                metric,
                baseline,
                candidate,
                diff,
                diff_pct,
            }
        })
        .collect()
}

/// Render the comparison as a plain text table
pub fn render_report(baseline_label: &str, candidate_label: &str, rows: &[MetricRow]) -> String {
    let rule = "-".repeat(80);
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(80));
    let _ = writeln!(out, "MODEL PERFORMANCE COMPARISON");
    let _ = writeln!(out, "{}", "=".repeat(80));
    let _ = writeln!(
        out,
        "{:<20} {:<20} {:<20} {:<20}",
        "Metric", baseline_label, candidate_label, "Difference"
    );
    let _ = writeln!(out, "{}", rule);
    for row in rows {
        let sign = if row.diff >= 0.0 { "+" } else { "" };
        let _ = writeln!(
            out,
            "{:<20} {:<20.3} {:<20.3} {}{:.3} ({}{:.1}%)",
            row.metric, row.baseline, row.candidate, sign, row.diff, sign, row.diff_pct
        );
    }
    let _ = writeln!(out, "{}", rule);
    out
}
