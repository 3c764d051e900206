use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::bucket::BucketLabel;
use crate::cohort::MissingCohortPolicy;

/// Top-level configuration for a fleet TBF analysis run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path of the install/remove event log (CSV with header row).
    #[serde(default)]
    pub input: PathBuf,

    /// Directory receiving the report and diagnostics. Default: "out".
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Cohort classification configuration.
    #[serde(default)]
    pub cohort: CohortConfig,

    /// Fleet description.
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Report rendering configuration.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Cohort classification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CohortConfig {
    /// Devices first installed before this Unix epoch are "old".
    /// Default: 1451620140 (2016-01-01 03:49:00 UTC).
    #[serde(default = "default_cutoff_epoch")]
    pub cutoff_epoch: i64,

    /// What to do with a device that has no install epoch anywhere.
    /// Default: abort.
    #[serde(default)]
    pub on_missing: MissingCohortPolicy,
}

/// Fleet description.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    /// Total device-slot capacity of the system. Default: 18688.
    #[serde(default = "default_capacity")]
    pub capacity: u64,
}

/// Report rendering configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// Per-device MTBF histogram layout.
    #[serde(default)]
    pub histogram: HistogramConfig,

    /// Optional quarter window for the quarterly series.
    #[serde(default)]
    pub window: QuarterWindowConfig,

    /// Output file names, relative to `output_dir`.
    #[serde(default)]
    pub files: ReportFilesConfig,
}

/// Per-device MTBF histogram layout.
#[derive(Debug, Clone, Deserialize)]
pub struct HistogramConfig {
    /// Number of equal-width bins. Default: 156 (about two weeks each).
    #[serde(default = "default_histogram_bins")]
    pub bins: usize,

    /// Upper bound of the histogram range in years. Default: 6.0.
    #[serde(default = "default_histogram_max_years")]
    pub max_years: f64,
}

/// Inclusive quarter window, e.g. `start: 2014-Q1`, `end: 2019-Q2`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuarterWindowConfig {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// Output file names.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportFilesConfig {
    /// Default: "report.json".
    #[serde(default = "default_report_file")]
    pub report: String,

    /// Default: "quarterly.csv".
    #[serde(default = "default_quarterly_file")]
    pub quarterly: String,

    /// Default: "monthly.csv".
    #[serde(default = "default_monthly_file")]
    pub monthly: String,

    /// Default: "unresolved_starts.dat".
    #[serde(default = "default_unresolved_file")]
    pub unresolved_starts: String,

    /// Default: "duplicate_entries.dat".
    #[serde(default = "default_duplicates_file")]
    pub duplicate_entries: String,
}

/// Parsed form of [`QuarterWindowConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuarterWindow {
    pub start: Option<BucketLabel>,
    pub end: Option<BucketLabel>,
}

impl QuarterWindow {
    /// Whether `label` falls inside the window.
    pub fn contains(&self, label: &BucketLabel) -> bool {
        self.start.map_or(true, |s| *label >= s) && self.end.map_or(true, |e| *label <= e)
    }
}

// --- Default value functions ---

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_cutoff_epoch() -> i64 {
    1_451_620_140
}

fn default_capacity() -> u64 {
    18_688
}

fn default_histogram_bins() -> usize {
    156
}

fn default_histogram_max_years() -> f64 {
    6.0
}

fn default_report_file() -> String {
    "report.json".to_string()
}

fn default_quarterly_file() -> String {
    "quarterly.csv".to_string()
}

fn default_monthly_file() -> String {
    "monthly.csv".to_string()
}

fn default_unresolved_file() -> String {
    "unresolved_starts.dat".to_string()
}

fn default_duplicates_file() -> String {
    "duplicate_entries.dat".to_string()
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output_dir: default_output_dir(),
            cohort: CohortConfig::default(),
            fleet: FleetConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            cutoff_epoch: default_cutoff_epoch(),
            on_missing: MissingCohortPolicy::default(),
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bins: default_histogram_bins(),
            max_years: default_histogram_max_years(),
        }
    }
}

impl Default for ReportFilesConfig {
    fn default() -> Self {
        Self {
            report: default_report_file(),
            quarterly: default_quarterly_file(),
            monthly: default_monthly_file(),
            unresolved_starts: default_unresolved_file(),
            duplicate_entries: default_duplicates_file(),
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            bail!("input is required");
        }

        if self.output_dir.as_os_str().is_empty() {
            bail!("output_dir must not be empty");
        }

        if self.fleet.capacity == 0 {
            bail!("fleet.capacity must be positive");
        }

        if self.report.histogram.bins == 0 {
            bail!("report.histogram.bins must be positive");
        }

        let max_years = self.report.histogram.max_years;
        if !max_years.is_finite() || max_years <= 0.0 {
            bail!("report.histogram.max_years must be a positive number");
        }

        self.quarter_window()?;

        let files = &self.report.files;
        for (key, name) in [
            ("report", &files.report),
            ("quarterly", &files.quarterly),
            ("monthly", &files.monthly),
            ("unresolved_starts", &files.unresolved_starts),
            ("duplicate_entries", &files.duplicate_entries),
        ] {
            if name.trim().is_empty() {
                bail!("report.files.{key} must not be empty");
            }
        }

        Ok(())
    }

    /// Parsed and checked quarter window.
    pub fn quarter_window(&self) -> Result<QuarterWindow> {
        let parse = |raw: &Option<String>, key: &str| -> Result<Option<BucketLabel>> {
            raw.as_deref()
                .map(|s| {
                    s.parse::<BucketLabel>()
                        .with_context(|| format!("invalid report.window.{key}"))
                })
                .transpose()
        };

        let window = QuarterWindow {
            start: parse(&self.report.window.start, "start")?,
            end: parse(&self.report.window.end, "end")?,
        };

        if let (Some(start), Some(end)) = (window.start, window.end) {
            if start > end {
                bail!("report.window.start {start} is after report.window.end {end}");
            }
        }

        Ok(window)
    }

    /// Full path of an output file.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            input: PathBuf::from("failures.csv"),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.cohort.cutoff_epoch, 1_451_620_140);
        assert_eq!(cfg.cohort.on_missing, MissingCohortPolicy::Abort);
        assert_eq!(cfg.fleet.capacity, 18_688);
        assert_eq!(cfg.report.histogram.bins, 156);
        assert_eq!(cfg.report.files.report, "report.json");
    }

    #[test]
    fn test_parse_yaml_overrides() {
        let yaml = r#"
input: /data/gc_full.csv
output_dir: /tmp/tbf
cohort:
  cutoff_epoch: 1500000000
  on_missing: exclude
fleet:
  capacity: 1024
report:
  histogram:
    bins: 52
  window:
    start: 2014-Q1
    end: 2019-Q2
"#;
        let cfg: Config = serde_yaml::from_str(yaml).expect("valid yaml");
        cfg.validate().expect("valid config");

        assert_eq!(cfg.input, PathBuf::from("/data/gc_full.csv"));
        assert_eq!(cfg.cohort.cutoff_epoch, 1_500_000_000);
        assert_eq!(cfg.cohort.on_missing, MissingCohortPolicy::Exclude);
        assert_eq!(cfg.fleet.capacity, 1024);
        assert_eq!(cfg.report.histogram.bins, 52);
        assert_eq!(cfg.report.histogram.max_years, 6.0);

        let window = cfg.quarter_window().expect("window");
        assert_eq!(window.start.map(|l| l.to_string()).as_deref(), Some("2014-Q1"));
        assert_eq!(window.end.map(|l| l.to_string()).as_deref(), Some("2019-Q2"));
    }

    #[test]
    fn test_validation_missing_input() {
        let cfg = Config::default();
        let err = cfg.validate().expect_err("input required");
        assert!(err.to_string().contains("input"));
    }

    #[test]
    fn test_validation_zero_capacity() {
        let mut cfg = valid_config();
        cfg.fleet.capacity = 0;
        let err = cfg.validate().expect_err("capacity");
        assert!(err.to_string().contains("fleet.capacity"));
    }

    #[test]
    fn test_validation_histogram_range() {
        let mut cfg = valid_config();
        cfg.report.histogram.max_years = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid_config();
        cfg.report.histogram.bins = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_window_order() {
        let mut cfg = valid_config();
        cfg.report.window.start = Some("2019-Q2".to_string());
        cfg.report.window.end = Some("2014-Q1".to_string());
        let err = cfg.validate().expect_err("reversed window");
        assert!(err.to_string().contains("after"));
    }

    #[test]
    fn test_validation_window_label() {
        let mut cfg = valid_config();
        cfg.report.window.start = Some("2019-06".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_window_contains() {
        let window = QuarterWindow {
            start: Some(BucketLabel::quarter(2015, 2)),
            end: None,
        };
        assert!(!window.contains(&BucketLabel::quarter(2015, 1)));
        assert!(window.contains(&BucketLabel::quarter(2015, 2)));
        assert!(window.contains(&BucketLabel::quarter(2030, 4)));
    }
}
