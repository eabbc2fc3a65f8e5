//! Performance-summary report loading, metric access and ROI cleanup.
//!
//! Report files are JSON documents with the interesting metrics nested
//! under `Statistics → Summary Performance Report`. The section carries a
//! bookkeeping `ordered_keys` entry which is dropped on load, a required
//! `Total Cycles Consumed` metric, and exactly one of two total
//! instruction counters depending on whether the run was single- or
//! multi-threaded.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use regex::Regex;
use serde_json::Value;

use crate::config::ReportKind;
use crate::error::{Error, Result};

const STATISTICS_KEY: &str = "Statistics";
const SUMMARY_SECTION_KEY: &str = "Summary Performance Report";
const ORDERED_KEYS_KEY: &str = "ordered_keys";

const TOTAL_CYCLES_KEY: &str = "Total Cycles Consumed";
const TOTAL_INSTS_KEY: &str = "Total Instructions Retired";
const TOTAL_INSTS_ALL_THREADS_KEY: &str = "Total Instructions Retired (All Threads)";

/// File-name marker of region-of-interest reports.
pub const ROI_MARKER: &str = "roi";

/// Extension of report files.
pub const REPORT_EXTENSION: &str = "json";

/// A loaded and validated summary performance report.
#[derive(Debug, Clone)]
pub struct SummaryReport {
    metrics: BTreeMap<String, Value>,
    total_cycles: f64,
    total_instructions: f64,
}

/// Extracts a number from a metric entry: either a bare number or an
/// object carrying a numeric `value` field (unit and other metadata ride
/// alongside).
fn metric_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("value").and_then(Value::as_f64),
        _ => None,
    }
}

fn metric_unit(value: &Value) -> Option<&str> {
    value.as_object().and_then(|m| m.get("unit")).and_then(Value::as_str)
}

impl SummaryReport {
    /// Loads a report file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&contents).map_err(|e| {
            Error::Report(format!("{} is not valid JSON: {}", path.display(), e))
        })?;
        Self::from_document(&document)
            .map_err(|e| Error::Report(format!("{}: {}", path.display(), e)))
    }

    /// Builds the report from a parsed JSON document.
    pub fn from_document(document: &Value) -> Result<Self> {
        let section = document
            .get(STATISTICS_KEY)
            .and_then(|s| s.get(SUMMARY_SECTION_KEY))
            .and_then(Value::as_object)
            .ok_or_else(|| {
                Error::Report(format!(
                    "missing '{} / {}' section",
                    STATISTICS_KEY, SUMMARY_SECTION_KEY
                ))
            })?;

        let mut metrics: BTreeMap<String, Value> = section
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        metrics.remove(ORDERED_KEYS_KEY);

        let total_cycles = metrics
            .get(TOTAL_CYCLES_KEY)
            .and_then(metric_number)
            .ok_or_else(|| Error::Report(format!("missing required metric '{}'", TOTAL_CYCLES_KEY)))?;

        // Single- and multi-thread runs carry the instruction total under
        // different keys; neither being present is malformed input, not an
        // implied zero.
        let total_instructions = metrics
            .get(TOTAL_INSTS_KEY)
            .or_else(|| metrics.get(TOTAL_INSTS_ALL_THREADS_KEY))
            .and_then(metric_number)
            .ok_or_else(|| {
                Error::Report(format!(
                    "missing both '{}' and '{}'",
                    TOTAL_INSTS_KEY, TOTAL_INSTS_ALL_THREADS_KEY
                ))
            })?;

        Ok(Self {
            metrics,
            total_cycles,
            total_instructions,
        })
    }

    pub fn total_cycles(&self) -> f64 {
        self.total_cycles
    }

    pub fn total_instructions(&self) -> f64 {
        self.total_instructions
    }

    /// Lists metric keys, optionally filtered by a regular expression.
    ///
    /// An invalid pattern degrades to the unfiltered key list.
    pub fn keys(&self, pattern: Option<&str>) -> Vec<&str> {
        let filter = pattern.and_then(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Invalid metric filter '{}', listing all keys: {}", p, e);
                None
            }
        });
        self.metrics
            .keys()
            .map(String::as_str)
            .filter(|k| filter.as_ref().map_or(true, |re| re.is_match(k)))
            .collect()
    }

    /// Fetches a single metric entry.
    pub fn metric(&self, name: &str) -> Option<&Value> {
        self.metrics.get(name)
    }

    /// Renders all metrics matching `pattern` as text, one per line.
    pub fn render(&self, pattern: Option<&str>) -> String {
        let mut out = String::new();
        for key in self.keys(pattern) {
            let value = &self.metrics[key];
            match (metric_number(value), metric_unit(value)) {
                (Some(n), Some(unit)) => {
                    let _ = writeln!(out, "{} = {} {}", key, n, unit);
                }
                (Some(n), None) => {
                    let _ = writeln!(out, "{} = {}", key, n);
                }
                _ => {
                    let _ = writeln!(out, "{} = {}", key, value);
                }
            }
        }
        out
    }
}

/// Deletes invalid ROI summaries of the given kind under `reports_root`.
///
/// An ROI window that captured no activity produces a report with zero
/// total cycles and zero total instructions; such files must not survive
/// validation. Files that fail to load are left in place and reported via
/// a warning. Re-running on a cleaned directory is a no-op.
pub fn clean_summaries(reports_root: &Path, kind: ReportKind) -> Result<Vec<PathBuf>> {
    let dir = reports_root.join(kind.as_str());
    if !dir.is_dir() {
        debug!("No {} report directory at {}, nothing to clean", kind, dir.display());
        return Ok(Vec::new());
    }

    let mut deleted = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if !name.contains(ROI_MARKER) || !name.ends_with(&format!(".{}", REPORT_EXTENSION)) {
            continue;
        }

        let report = match SummaryReport::load(&path) {
            Ok(report) => report,
            Err(e) => {
                warn!("Skipping unreadable ROI summary {}: {}", path.display(), e);
                continue;
            }
        };

        if report.total_cycles() == 0.0 && report.total_instructions() == 0.0 {
            fs::remove_file(&path)?;
            info!("Deleted empty ROI summary {}", path.display());
            deleted.push(path);
        }
    }
    Ok(deleted)
}
