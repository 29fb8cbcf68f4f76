//! Result tables, aggregation and run reports

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::domain::model::*;
use crate::engine::PoolOutcome;

pub mod writer;

pub use writer::TableWriter;

/// A rectangular table of string cells with named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Table of per-sample records in the standard column order
    pub fn from_records(records: &[MetricRecord]) -> Self {
        let mut table = Self::new(MetricRecord::COLUMNS.iter().map(|c| c.to_string()).collect());
        table.rows = records.iter().map(MetricRecord::to_row).collect();
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell of `row` under column `name`
    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let column = self.column(name)?;
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// Stack tables vertically over the union of their columns.
    ///
    /// Columns keep first-seen order; cells a table lacks are empty. Rows are
    /// never deduplicated.
    pub fn concat(tables: &[ResultTable]) -> ResultTable {
        let mut columns: Vec<String> = Vec::new();
        for table in tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut merged = ResultTable::new(columns);
        for table in tables {
            let mapping: Vec<Option<usize>> = merged
                .columns
                .iter()
                .map(|column| table.column(column))
                .collect();
            for row in &table.rows {
                merged.rows.push(
                    mapping
                        .iter()
                        .map(|source| {
                            source
                                .and_then(|index| row.get(index).cloned())
                                .unwrap_or_default()
                        })
                        .collect(),
                );
            }
        }
        merged
    }
}

/// Columns of the per-run summary table
pub const SUMMARY_COLUMNS: [&str; 18] = [
    "dataset_id",
    "resolution",
    "codec",
    "pixel_format",
    "keyframe_interval",
    "compression_level",
    "scenario",
    "backend",
    "video_size_bytes",
    "images_size_bytes",
    "compression_ratio",
    "avg_load_time_video_ms",
    "avg_load_time_images_ms",
    "avg_load_time_ratio",
    "avg_mse",
    "avg_psnr",
    "avg_ssim",
    "samples",
];

/// Extra summary column after `SUMMARY_COLUMNS`
pub const FAILED_SAMPLES_COLUMN: &str = "failed_samples";

/// Collects worker output and groups it for persistence
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    records: Vec<MetricRecord>,
    failures: Vec<SampleFailure>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_outcome(&mut self, outcome: PoolOutcome) {
        self.records.extend(outcome.records);
        self.failures.extend(outcome.failures);
    }

    pub fn add_records(&mut self, records: impl IntoIterator<Item = MetricRecord>) {
        self.records.extend(records);
    }

    pub fn add_failures(&mut self, failures: impl IntoIterator<Item = SampleFailure>) {
        self.failures.extend(failures);
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn failures(&self) -> &[SampleFailure] {
        &self.failures
    }

    /// One table per (codec, pixel format), rows in arrival order
    pub fn combination_tables(&self) -> BTreeMap<Combination, ResultTable> {
        let mut grouped: BTreeMap<Combination, Vec<MetricRecord>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry(record.combination())
                .or_default()
                .push(record.clone());
        }
        grouped
            .into_iter()
            .map(|(combination, records)| (combination, ResultTable::from_records(&records)))
            .collect()
    }

    /// One row per (artifact, scenario, backend) with averaged metrics.
    ///
    /// Rows are ordered by run key and samples are summed in sample order, so
    /// the result does not depend on the order records arrived in.
    pub fn summary_table(&self) -> ResultTable {
        let mut runs: BTreeMap<RunKey, (Vec<&MetricRecord>, usize)> = BTreeMap::new();
        for record in &self.records {
            runs.entry(record.run_key()).or_default().0.push(record);
        }
        for failure in &self.failures {
            runs.entry(failure.key.clone()).or_default().1 += 1;
        }

        let mut columns: Vec<String> = SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.push(FAILED_SAMPLES_COLUMN.to_string());
        let mut table = ResultTable::new(columns);

        for (key, (mut records, failed)) in runs {
            records.sort_by_key(|r| r.sample_index);
            table.rows.push(summary_row(&key, &records, failed));
        }
        table
    }
}

fn mean(records: &[&MetricRecord], field: impl Fn(&MetricRecord) -> f64) -> f64 {
    records.iter().map(|r| field(r)).sum::<f64>() / records.len() as f64
}

fn summary_row(key: &RunKey, records: &[&MetricRecord], failed: usize) -> Vec<String> {
    let mut row = vec![key.dataset_id.clone()];

    match records.first() {
        Some(first) => {
            let video_ms = mean(records, |r| r.load_time_video_ms);
            let images_ms = mean(records, |r| r.load_time_images_ms);
            row.push(first.resolution.clone());
            row.extend([
                key.codec.clone(),
                key.pixel_format.clone(),
                format_param(key.keyframe_interval),
                format_param(key.compression_level),
                key.scenario.to_string(),
                key.backend.clone(),
            ]);
            row.extend([
                first.video_size_bytes.to_string(),
                first.images_size_bytes.to_string(),
                format_metric(first.compression_ratio),
                format_metric(video_ms),
                format_metric(images_ms),
                format_metric(video_ms / images_ms),
                format_metric(mean(records, |r| r.mse)),
                format_metric(mean(records, |r| r.psnr)),
                format_metric(mean(records, |r| r.ssim)),
            ]);
        }
        None => {
            row.push(String::new());
            row.extend([
                key.codec.clone(),
                key.pixel_format.clone(),
                format_param(key.keyframe_interval),
                format_param(key.compression_level),
                key.scenario.to_string(),
                key.backend.clone(),
            ]);
            row.extend(std::iter::repeat(String::new()).take(9));
        }
    }

    row.push(records.len().to_string());
    row.push(failed.to_string());
    row
}

/// Counters reported at the end of a sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepCounters {
    pub datasets_loaded: usize,
    pub datasets_skipped: usize,
    pub specs_attempted: usize,
    pub specs_encoded: usize,
    pub specs_reused: usize,
    pub specs_skipped: usize,
    pub combinations_filtered: usize,
    pub decode_runs: usize,
    pub decode_runs_skipped: usize,
    pub samples_scored: usize,
    pub sample_failures: usize,
}

/// Files written by a sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputPaths {
    pub combination_tables: Vec<PathBuf>,
    pub final_table: Option<PathBuf>,
    pub summary_table: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

/// JSON report persisted next to the final table
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: chrono::DateTime<chrono::Local>,
    pub finished_at: chrono::DateTime<chrono::Local>,
    pub num_samples: usize,
    pub num_workers: usize,
    pub seed: u64,
    pub counters: SweepCounters,
    pub backends: BTreeMap<String, BackendCapabilities>,
    pub skipped: Vec<String>,
    pub failures: Vec<SampleFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(codec: &str, scenario: TimestampScenario, sample_index: usize, mse: f64) -> MetricRecord {
        MetricRecord {
            dataset_id: "set".to_string(),
            resolution: "8 x 8".to_string(),
            num_pixels: 64,
            codec: codec.to_string(),
            pixel_format: "yuv420p".to_string(),
            keyframe_interval: Some(2),
            compression_level: None,
            video_size_bytes: 100,
            images_size_bytes: 400,
            compression_ratio: 0.25,
            scenario,
            backend: "ffmpeg-seek".to_string(),
            sample_index,
            anchor_timestamp: sample_index as f64 / 10.0,
            load_time_video_ms: 2.0,
            load_time_images_ms: 1.0,
            load_time_ratio: 2.0,
            mse,
            psnr: 30.0,
            ssim: 0.9,
        }
    }

    fn table(columns: &[&str], rows: &[&[&str]]) -> ResultTable {
        ResultTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_concat_same_columns_keeps_all_rows() {
        let a = table(&["x", "y"], &[&["1", "2"]]);
        let b = table(&["x", "y"], &[&["1", "2"], &["3", "4"]]);
        let merged = ResultTable::concat(&[a, b]);
        assert_eq!(merged.columns, vec!["x", "y"]);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_concat_takes_column_union() {
        let a = table(&["x", "y"], &[&["1", "2"]]);
        let b = table(&["y", "z"], &[&["3", "4"]]);
        let merged = ResultTable::concat(&[a, b]);
        assert_eq!(merged.columns, vec!["x", "y", "z"]);
        assert_eq!(merged.rows[0], vec!["1", "2", ""]);
        assert_eq!(merged.rows[1], vec!["", "3", "4"]);
    }

    /// Rows as column-name maps, sorted, so column order and row order drop out
    fn row_set(table: &ResultTable) -> Vec<BTreeMap<String, String>> {
        let mut rows: Vec<BTreeMap<String, String>> = table
            .rows
            .iter()
            .map(|row| table.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect();
        rows.sort();
        rows
    }

    #[test]
    fn test_concat_is_order_independent_and_associative() {
        let a = table(&["codec", "mse"], &[&["libx264", "0.1"], &["libx264", "0.1"]]);
        let b = table(&["codec", "ssim"], &[&["libx265", "0.9"]]);
        let c = table(&["ssim", "psnr", "codec"], &[&["0.8", "inf", "libsvtav1"]]);

        let expected = row_set(&ResultTable::concat(&[a.clone(), b.clone(), c.clone()]));
        assert_eq!(expected.len(), 4);

        let orders = [
            [&a, &c, &b],
            [&b, &a, &c],
            [&b, &c, &a],
            [&c, &a, &b],
            [&c, &b, &a],
        ];
        for order in orders {
            let tables: Vec<ResultTable> = order.iter().map(|t| (*t).clone()).collect();
            assert_eq!(row_set(&ResultTable::concat(&tables)), expected);
        }

        let left = ResultTable::concat(&[ResultTable::concat(&[a.clone(), b.clone()]), c.clone()]);
        let right = ResultTable::concat(&[a, ResultTable::concat(&[b, c])]);
        assert_eq!(row_set(&left), expected);
        assert_eq!(row_set(&right), expected);
    }

    #[test]
    fn test_concat_empty_input() {
        assert!(ResultTable::concat(&[]).columns.is_empty());
    }

    #[test]
    fn test_combination_tables_group_by_codec_and_pixel_format() {
        let mut aggregator = Aggregator::new();
        aggregator.add_records(vec![
            record("libx264", TimestampScenario::OneFrame, 0, 0.1),
            record("libx265", TimestampScenario::OneFrame, 0, 0.2),
            record("libx264", TimestampScenario::TwoFrames, 1, 0.3),
        ]);
        let tables = aggregator.combination_tables();
        assert_eq!(tables.len(), 2);
        let x264 = &tables[&Combination::new("libx264", "yuv420p")];
        assert_eq!(x264.len(), 2);
        assert_eq!(x264.columns.len(), MetricRecord::COLUMNS.len());
    }

    #[test]
    fn test_summary_is_order_independent() {
        let records = vec![
            record("libx264", TimestampScenario::OneFrame, 0, 0.1),
            record("libx264", TimestampScenario::OneFrame, 1, 0.2),
            record("libx264", TimestampScenario::OneFrame, 2, 0.4),
            record("libx264", TimestampScenario::SixFrames, 0, 0.3),
        ];
        let mut forward = Aggregator::new();
        forward.add_records(records.clone());
        let mut backward = Aggregator::new();
        backward.add_records(records.into_iter().rev());

        let summary = forward.summary_table();
        assert_eq!(summary, backward.summary_table());
        assert_eq!(summary.len(), 2);
        assert_eq!(summary.cell(0, "samples"), Some("3"));
        assert_eq!(summary.cell(0, "avg_load_time_ratio"), Some("2"));
        let avg_mse: f64 = summary.cell(0, "avg_mse").unwrap().parse().unwrap();
        assert!((avg_mse - 0.7 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_summary_counts_failures() {
        let ok = record("libx264", TimestampScenario::OneFrame, 0, 0.1);
        let failed_run = RunKey {
            scenario: TimestampScenario::TwoFrames,
            ..ok.run_key()
        };
        let mut aggregator = Aggregator::new();
        aggregator.add_records(vec![ok.clone()]);
        aggregator.add_failures(vec![
            SampleFailure::new(ok.run_key(), 1, "boom"),
            SampleFailure::new(failed_run, 0, "boom"),
        ]);

        let summary = aggregator.summary_table();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary.cell(0, FAILED_SAMPLES_COLUMN), Some("1"));
        assert_eq!(summary.cell(1, "samples"), Some("0"));
        assert_eq!(summary.cell(1, "avg_mse"), Some(""));
        assert!(summary.rows.iter().all(|r| r.len() == summary.columns.len()));
    }
}
