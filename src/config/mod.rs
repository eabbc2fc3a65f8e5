//! Configuration types for simrelay.
//!
//! Two kinds of configuration live here:
//!
//! - [`ExperimentConfig`] is the typed form of the `config.json` document
//!   that travels inside the transport package and tells the service what
//!   to run and which reports to produce.
//! - [`UserConfig`] is the operator's local credentials file
//!   (`apikey`/`channel`/`region`), resolved from an environment snapshot
//!   first and a config file second.
//!
//! # User Configuration File Location
//!
//! - Linux: `~/.config/simrelay/config.yml`
//! - macOS: `~/Library/Application Support/simrelay/config.yml`
//! - Windows: `C:\Users\<User>\AppData\Roaming\simrelay\config.yml`
//!
//! The same three fields can instead be carried in a single colon-delimited
//! environment variable, `SIMRELAY_AUTH=apikey:channel:region`, which takes
//! precedence over the file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable carrying `apikey:channel:region`.
pub const USER_CONFIG_ENV: &str = "SIMRELAY_AUTH";

/// Window end value meaning "run to completion".
pub const WINDOW_TO_COMPLETION: i64 = -1;

/// Report kinds the service can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    PerfSummary,
    InstCount,
    InstTrace,
}

impl ReportKind {
    /// Directory and file-stem name used in the unpacked `reports/` tree.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::PerfSummary => "perf_summary",
            ReportKind::InstCount => "inst_count",
            ReportKind::InstTrace => "inst_trace",
        }
    }

    /// File name of the primary report of this kind (`<kind>.json`).
    pub fn report_file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "perf_summary" | "perf-summary" => Ok(ReportKind::PerfSummary),
            "inst_count" | "inst-count" => Ok(ReportKind::InstCount),
            "inst_trace" | "inst-trace" => Ok(ReportKind::InstTrace),
            other => Err(Error::Config(format!(
                "unknown report kind '{}' (expected perf_summary, inst_count or inst_trace)",
                other
            ))),
        }
    }
}

/// A single report requested from the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDescriptor {
    /// Report kind
    pub kind: ReportKind,
    /// Unique id of this descriptor within the experiment
    pub id: String,
    /// First instruction of the window
    pub start: u64,
    /// Last instruction of the window, -1 meaning "to completion"
    pub end: i64,
    /// Sampling resolution in instructions
    pub resolution: u64,
    /// Whether this descriptor describes a region of interest
    pub roi: bool,
}

impl ReportDescriptor {
    /// Creates a whole-run descriptor (window from 0 to completion, no ROI).
    pub fn whole_run(kind: ReportKind, id: impl Into<String>, resolution: u64) -> Self {
        Self {
            kind,
            id: id.into(),
            start: 0,
            end: WINDOW_TO_COMPLETION,
            resolution,
            roi: false,
        }
    }

    /// Creates an ROI descriptor over a bounded instruction window.
    pub fn roi(kind: ReportKind, id: impl Into<String>, start: u64, end: i64, resolution: u64) -> Self {
        Self {
            kind,
            id: id.into(),
            start,
            end,
            resolution,
            roi: true,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Config("report descriptor id must not be empty".into()));
        }
        if self.end < WINDOW_TO_COMPLETION {
            return Err(Error::Config(format!(
                "report '{}' has invalid window end {}",
                self.id, self.end
            )));
        }
        if self.end != WINDOW_TO_COMPLETION && (self.end as u64) < self.start {
            return Err(Error::Config(format!(
                "report '{}' has window end {} before start {}",
                self.id, self.end, self.start
            )));
        }
        Ok(())
    }
}

/// One workload entry of the uploaded configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadEntry {
    /// Base name of the workload binary inside the package
    pub elf: String,
    /// Optional simulation trace file associated with the workload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zstf: Option<String>,
}

/// Typed form of the `config.json` document uploaded with the package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Experiment name (timestamp-prefixed unique id)
    pub name: String,
    /// Target core name
    pub core: String,
    /// Workloads contained in the package
    pub workload: Vec<WorkloadEntry>,
    /// Random id for the submission
    pub uuid: String,
    /// Simulation timeout in seconds
    pub timeout: u64,
    /// Hex-encoded one-time secret used to decrypt the result archive
    pub otp: String,
    /// Reports requested from the service
    pub reports: Vec<ReportDescriptor>,
    /// Operator API key
    pub apikey: String,
    /// Target architecture
    pub arch: String,
}

impl ExperimentConfig {
    /// Validates field contents before the configuration is packaged.
    ///
    /// Unknown or missing fields are a validation failure here rather than
    /// a lookup failure later in the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("experiment name must not be empty".into()));
        }
        if self.core.is_empty() {
            return Err(Error::Config("target core must not be empty".into()));
        }
        if self.arch.is_empty() {
            return Err(Error::Config("target architecture must not be empty".into()));
        }
        if self.workload.is_empty() {
            return Err(Error::Config("at least one workload is required".into()));
        }
        if self.timeout == 0 {
            return Err(Error::Config("timeout must be positive".into()));
        }
        if self.otp.len() != 64 || !self.otp.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Config(
                "otp must be 32 random bytes in hex encoding".into(),
            ));
        }
        if self.apikey.is_empty() {
            return Err(Error::Config("apikey must not be empty".into()));
        }
        for report in &self.reports {
            report.validate()?;
        }
        Ok(())
    }

    /// Serializes the configuration to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize experiment config: {}", e)))
    }
}

/// The operator's local credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// API key used for control-plane requests
    pub apikey: String,
    /// Service channel (e.g. release train) to submit against
    pub channel: String,
    /// Service region
    pub region: String,
}

impl UserConfig {
    /// Returns the default configuration file path for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("simrelay").join("config.yml"))
    }

    /// Parses the colon-delimited `apikey:channel:region` form.
    pub fn from_env_value(value: &str) -> Result<Self> {
        let mut parts = value.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(apikey), Some(channel), Some(region))
                if !apikey.is_empty() && !channel.is_empty() && !region.is_empty() =>
            {
                Ok(Self {
                    apikey: apikey.to_string(),
                    channel: channel.to_string(),
                    region: region.to_string(),
                })
            }
            _ => Err(Error::Config(format!(
                "{} must contain exactly apikey:channel:region",
                USER_CONFIG_ENV
            ))),
        }
    }

    /// Resolves the user configuration from an environment snapshot.
    ///
    /// Precedence: the environment value if present, then the config file,
    /// otherwise an error. Missing local configuration is fatal to a run.
    pub fn resolve(env_value: Option<&str>, path: Option<&Path>) -> Result<Self> {
        if let Some(value) = env_value {
            return Self::from_env_value(value);
        }
        if let Some(path) = path {
            if path.exists() {
                return Self::load_from(path);
            }
        }
        Err(Error::Config(format!(
            "no local configuration found\n\n\
             Suggestions:\n\
             • Set {}=apikey:channel:region in the environment\n\
             • Or create the config file with: simrelay config init",
            USER_CONFIG_ENV
        )))
    }

    /// Loads the configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file: {}\n\n\
                 File path: {}\n\n\
                 Suggestions:\n\
                 • Check file permissions: ls -la {}\n\
                 • Try recreating with: simrelay config init",
                e,
                path.display(),
                path.display()
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            Error::Config(format!(
                "failed to parse config file: {}\n\n\
                 File path: {}\n\n\
                 Suggestions:\n\
                 • Check YAML syntax in the config file\n\
                 • Backup and recreate: mv {} {}.bak && simrelay config init",
                e,
                path.display(),
                path.display(),
                path.display()
            ))
        })
    }

    /// Saves the configuration to a specific file path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ExperimentConfig {
        ExperimentConfig {
            name: "20260807-120000-ab12cd34".to_string(),
            core: "falcon-x2".to_string(),
            workload: vec![WorkloadEntry {
                elf: "bench".to_string(),
                zstf: None,
            }],
            uuid: "f67c2bcb-4b43-4f39-9dc6-9e42f5b3e4a8".to_string(),
            timeout: 3600,
            otp: "ab".repeat(32),
            reports: vec![ReportDescriptor::whole_run(ReportKind::PerfSummary, "summary", 1000)],
            apikey: "k-123".to_string(),
            arch: "rv64gc".to_string(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_bad_otp_rejected() {
        let mut config = sample_config();
        config.otp = "not-hex".to_string();
        assert!(config.validate().is_err());

        config.otp = "ab".repeat(16);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_workloads_rejected() {
        let mut config = sample_config();
        config.workload.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_end_before_start_rejected() {
        let mut config = sample_config();
        config.reports = vec![ReportDescriptor::roi(ReportKind::PerfSummary, "r1", 500, 100, 10)];
        assert!(config.validate().is_err());

        config.reports = vec![ReportDescriptor::roi(ReportKind::PerfSummary, "r1", 500, -1, 10)];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = sample_config();
        let json = config.to_json().unwrap();
        let parsed: ExperimentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, config.name);
        assert_eq!(parsed.reports, config.reports);
        assert_eq!(parsed.workload, config.workload);
    }

    #[test]
    fn test_report_kind_strings() {
        assert_eq!(ReportKind::PerfSummary.report_file_name(), "perf_summary.json");
        assert_eq!("inst-count".parse::<ReportKind>().unwrap(), ReportKind::InstCount);
        assert!("bogus".parse::<ReportKind>().is_err());
    }

    #[test]
    fn test_user_config_env_precedence() {
        let resolved = UserConfig::resolve(Some("key:stable:eu-west"), None).unwrap();
        assert_eq!(
            resolved,
            UserConfig {
                apikey: "key".to_string(),
                channel: "stable".to_string(),
                region: "eu-west".to_string(),
            }
        );
    }

    #[test]
    fn test_user_config_env_malformed() {
        assert!(UserConfig::resolve(Some("key:stable"), None).is_err());
        assert!(UserConfig::resolve(Some(":stable:eu"), None).is_err());
    }

    #[test]
    fn test_user_config_missing_everything() {
        let err = UserConfig::resolve(None, None).unwrap_err();
        assert_eq!(err.phase(), "config");
    }

    #[test]
    fn test_user_config_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        let config = UserConfig {
            apikey: "k".to_string(),
            channel: "beta".to_string(),
            region: "us-east".to_string(),
        };
        config.save_to(&path).unwrap();
        let resolved = UserConfig::resolve(None, Some(&path)).unwrap();
        assert_eq!(resolved, config);
    }
}
