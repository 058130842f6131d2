//! Aggregation and ranking of finished runs.
//!
//! Reads the output tree produced by a sweep:
//!
//! ```text
//! <root>/<scenario>/output_run<i>/<...>STATS<...>.txt
//! ```
//!
//! computes the mean `Ratio:` value per scenario and writes the scenarios in
//! descending order of that mean to `<root>/result.txt`, one
//! `AVG_RATIO:<scenario>:<mean>` line each.

use std::cmp::Ordering;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::DEFAULT_SUMMARY_FILE;
use crate::error::AggregateError;
use crate::scheduler::is_stats_file;

/// Directory-name marker of a per-repeat directory.
pub const RUN_DIR_MARKER: &str = "output_run";

/// Prefix of the metric line inside a STATS file.
pub const RATIO_PREFIX: &str = "Ratio:";

/// Prefix of every label in the summary.
pub const LABEL_PREFIX: &str = "AVG_RATIO:";

/// Mean ratio of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRatio {
    /// Scenario directory name.
    pub scenario: String,
    /// `AVG_RATIO:<scenario>`.
    pub label: String,
    /// Arithmetic mean over all readable STATS files; 0.0 when there are none.
    pub ratio: f64,
    /// Number of files that contributed a ratio.
    pub samples: usize,
    /// Number of STATS files found, readable or not.
    pub files_found: usize,
}

impl ScenarioRatio {
    /// Summary line for this entry.
    pub fn summary_line(&self) -> String {
        format!("{}:{}", self.label, format_ratio(self.ratio))
    }
}

/// Scenarios ranked by descending mean ratio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedSummary {
    /// Entries, best first.
    pub entries: Vec<ScenarioRatio>,
}

impl RankedSummary {
    /// Ranks entries by descending ratio, ties by ascending label.
    pub fn from_entries(mut entries: Vec<ScenarioRatio>) -> Self {
        entries.sort_by(|a, b| {
            b.ratio
                .partial_cmp(&a.ratio)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });
        Self { entries }
    }

    /// Looks up the mean ratio of a label.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.ratio)
    }

    /// Renders the summary file content.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.summary_line());
            out.push('\n');
        }
        out
    }

    /// Number of ranked scenarios.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no scenario was found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scans an output tree and writes the ranked summary.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    summary_file: String,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self {
            summary_file: DEFAULT_SUMMARY_FILE.to_string(),
        }
    }
}

impl ResultAggregator {
    /// Creates an aggregator writing `result.txt`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the summary file name.
    pub fn with_summary_file(mut self, name: impl Into<String>) -> Self {
        self.summary_file = name.into();
        self
    }

    /// Path the summary is written to for a given root.
    pub fn summary_path(&self, root: &Path) -> PathBuf {
        root.join(&self.summary_file)
    }

    /// Computes the ranked summary without writing it.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError` if `root` is missing or cannot be listed.
    /// Unreadable files and malformed lines are skipped.
    pub fn scan(&self, root: &Path) -> Result<RankedSummary, AggregateError> {
        if !root.is_dir() {
            return Err(AggregateError::MissingRoot(root.to_path_buf()));
        }

        let mut scenario_dirs = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.contains(RUN_DIR_MARKER) {
                continue;
            }
            scenario_dirs.push((name, entry.path()));
        }
        scenario_dirs.sort();

        let entries = scenario_dirs
            .into_iter()
            .map(|(name, path)| scenario_ratio(name, &path))
            .collect();

        Ok(RankedSummary::from_entries(entries))
    }

    /// Computes the ranked summary and writes it into `root`.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError` if scanning fails or the summary cannot be
    /// written.
    pub fn aggregate(&self, root: &Path) -> Result<RankedSummary, AggregateError> {
        let summary = self.scan(root)?;
        let path = self.summary_path(root);

        fs::write(&path, summary.to_text())
            .map_err(|source| AggregateError::WriteSummary {
                path: path.clone(),
                source,
            })?;

        info!(
            scenarios = summary.len(),
            path = %path.display(),
            "Ranked summary written"
        );
        Ok(summary)
    }
}

/// Averages the STATS files two levels below a scenario directory.
fn scenario_ratio(scenario: String, dir: &Path) -> ScenarioRatio {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(scenario = %scenario, error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_stats_file(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    let mut sum = 0.0;
    let mut samples = 0usize;
    for file in &files {
        match read_ratio(file) {
            Some(value) => {
                sum += value;
                samples += 1;
            }
            None => debug!(file = %file.display(), "No usable ratio line"),
        }
    }

    let ratio = if samples > 0 { sum / samples as f64 } else { 0.0 };

    ScenarioRatio {
        label: format!("{}{}", LABEL_PREFIX, scenario),
        scenario,
        ratio,
        samples,
        files_found: files.len(),
    }
}

/// Reads the value of the first `Ratio:` line of a STATS file.
///
/// Scanning stops at that line. Returns `None` if its remainder is not a
/// finite number, the file is unreadable, or no `Ratio:` line exists.
pub fn read_ratio(path: &Path) -> Option<f64> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Skipping unreadable stats file");
            return None;
        }
    };

    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Stopped reading stats file");
                return None;
            }
        };
        if let Some(rest) = line.strip_prefix(RATIO_PREFIX) {
            return match rest.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => Some(value),
                _ => {
                    warn!(file = %path.display(), line = %line, "Unparsable ratio line");
                    None
                }
            };
        }
    }

    None
}

/// Formats a ratio for the summary file; integral values keep one decimal.
pub fn format_ratio(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_stats(root: &Path, scenario: &str, run: u32, file: &str, content: &str) {
        let dir = root.join(scenario).join(format!("output_run{}", run));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_mean_of_two_runs() {
        let temp = TempDir::new().unwrap();
        write_stats(temp.path(), "A", 0, "c_STATS.txt", "Ratio:0.5\n");
        write_stats(temp.path(), "A", 1, "c_STATS.txt", "Ratio:0.7\n");

        let summary = ResultAggregator::new().scan(temp.path()).unwrap();
        let ratio = summary.get("AVG_RATIO:A").unwrap();

        assert!((ratio - 0.6).abs() < 1e-12);
        assert_eq!(summary.entries[0].samples, 2);
    }

    #[test]
    fn test_scenario_without_stats_is_zero() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("Empty/output_run0")).unwrap();
        fs::write(temp.path().join("Empty/output_run0/trace.txt"), "Ratio:0.9").unwrap();

        let summary = ResultAggregator::new().scan(temp.path()).unwrap();
        assert_eq!(summary.get("AVG_RATIO:Empty"), Some(0.0));
        assert_eq!(summary.entries[0].files_found, 0);
    }

    #[test]
    fn test_ranking_descending() {
        let temp = TempDir::new().unwrap();
        write_stats(temp.path(), "A", 0, "STATS.txt", "Ratio:0.2\n");
        write_stats(temp.path(), "B", 0, "STATS.txt", "Ratio:0.9\n");
        write_stats(temp.path(), "C", 0, "STATS.txt", "Ratio:0.5\n");

        let summary = ResultAggregator::new().aggregate(temp.path()).unwrap();
        let labels: Vec<&str> = summary.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["AVG_RATIO:B", "AVG_RATIO:C", "AVG_RATIO:A"]);

        let written = fs::read_to_string(temp.path().join("result.txt")).unwrap();
        assert_eq!(
            written,
            "AVG_RATIO:B:0.9\nAVG_RATIO:C:0.5\nAVG_RATIO:A:0.2\n"
        );
    }

    #[test]
    fn test_only_first_ratio_line_counts() {
        let temp = TempDir::new().unwrap();
        write_stats(
            temp.path(),
            "A",
            0,
            "STATS.txt",
            "Header\nRatio:0.25\nRatio:0.99\n",
        );

        let summary = ResultAggregator::new().scan(temp.path()).unwrap();
        assert_eq!(summary.get("AVG_RATIO:A"), Some(0.25));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let temp = TempDir::new().unwrap();
        write_stats(temp.path(), "A", 0, "STATS.txt", "noise\nRatio: 0.4 \nRatio:0.8\n");
        write_stats(temp.path(), "A", 1, "STATS.txt", "Ratio:\n");
        write_stats(temp.path(), "A", 2, "STATS.txt", "ratio:0.9\n");

        let summary = ResultAggregator::new().scan(temp.path()).unwrap();
        let entry = &summary.entries[0];
        assert_eq!(entry.samples, 1);
        assert_eq!(entry.files_found, 3);
        assert_eq!(entry.ratio, 0.4);
    }

    #[test]
    fn test_unparsable_first_ratio_line_drops_the_file() {
        let temp = TempDir::new().unwrap();
        write_stats(temp.path(), "A", 0, "STATS.txt", "Ratio:abc\nRatio:0.9\n");
        write_stats(temp.path(), "B", 0, "STATS.txt", "Ratio:NaN\nRatio:0.9\n");
        write_stats(temp.path(), "B", 1, "STATS.txt", "Ratio:0.2\n");

        let path = temp.path().join("A/output_run0/STATS.txt");
        assert_eq!(read_ratio(&path), None);

        let summary = ResultAggregator::new().scan(temp.path()).unwrap();
        let a = summary.entries.iter().find(|e| e.scenario == "A").unwrap();
        assert_eq!(a.samples, 0);
        assert_eq!(a.files_found, 1);
        assert_eq!(a.ratio, 0.0);
        assert_eq!(summary.get("AVG_RATIO:B"), Some(0.2));
    }

    #[test]
    fn test_non_utf8_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        write_stats(temp.path(), "A", 0, "STATS.txt", "Ratio:0.3\n");
        let dir = temp.path().join("A/output_run1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("STATS.txt"), [0xff, 0xfe, 0x52]).unwrap();

        let summary = ResultAggregator::new().scan(temp.path()).unwrap();
        assert_eq!(summary.get("AVG_RATIO:A"), Some(0.3));
    }

    #[test]
    fn test_run_dirs_and_files_at_root_are_skipped() {
        let temp = TempDir::new().unwrap();
        write_stats(temp.path(), "A", 0, "STATS.txt", "Ratio:0.1\n");
        fs::create_dir_all(temp.path().join("output_run3/x")).unwrap();
        fs::write(temp.path().join("result.txt"), "stale").unwrap();

        let summary = ResultAggregator::new().scan(temp.path()).unwrap();
        assert_eq!(summary.len(), 1);
        assert!(summary.get("AVG_RATIO:output_run3").is_none());
    }

    #[test]
    fn test_stats_depth_is_exactly_two() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("A/output_run0/deeper")).unwrap();
        fs::write(temp.path().join("A/STATS.txt"), "Ratio:0.9\n").unwrap();
        fs::write(
            temp.path().join("A/output_run0/deeper/STATS.txt"),
            "Ratio:0.9\n",
        )
        .unwrap();
        write_stats(temp.path(), "A", 1, "STATS.txt", "Ratio:0.1\n");

        let summary = ResultAggregator::new().scan(temp.path()).unwrap();
        assert_eq!(summary.get("AVG_RATIO:A"), Some(0.1));
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let temp = TempDir::new().unwrap();
        write_stats(temp.path(), "A", 0, "STATS.txt", "Ratio:0.2\n");
        write_stats(temp.path(), "B", 0, "STATS.txt", "Ratio:0.2\n");
        write_stats(temp.path(), "C", 0, "STATS.txt", "Ratio:0.8\n");

        let aggregator = ResultAggregator::new();
        aggregator.aggregate(temp.path()).unwrap();
        let first = fs::read_to_string(temp.path().join("result.txt")).unwrap();
        aggregator.aggregate(temp.path()).unwrap();
        let second = fs::read_to_string(temp.path().join("result.txt")).unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with("AVG_RATIO:C:0.8\n"));
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = ResultAggregator::new()
            .scan(&temp.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, AggregateError::MissingRoot(_)));
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(0.0), "0.0");
        assert_eq!(format_ratio(1.0), "1.0");
        assert_eq!(format_ratio(0.6), "0.6");
        assert_eq!(format_ratio(0.125), "0.125");
    }

    #[test]
    fn test_custom_summary_file() {
        let temp = TempDir::new().unwrap();
        write_stats(temp.path(), "A", 0, "STATS.txt", "Ratio:0.5\n");

        ResultAggregator::new()
            .with_summary_file("ranking.txt")
            .aggregate(temp.path())
            .unwrap();
        assert!(temp.path().join("ranking.txt").exists());
        assert!(!temp.path().join("result.txt").exists());
    }
}
