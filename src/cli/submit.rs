//! Submit command: run the whole transport pipeline for one experiment.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Args;
use log::info;
use uuid::Uuid;

use crate::config::{
    ExperimentConfig, ReportDescriptor, ReportKind, UserConfig, WorkloadEntry, USER_CONFIG_ENV,
};
use crate::crypto::otp;
use crate::experiment::Experiment;
use crate::pipeline::Pipeline;
use crate::snapshot::snapshot_sources;
use crate::transport::{ControlPlaneClient, PollConfig};

#[derive(Args)]
pub struct SubmitCommand {
    #[arg(long, required = true, help = "Target core name")]
    pub core: String,

    #[arg(long, required = true, help = "Target architecture")]
    pub arch: String,

    #[arg(
        short,
        long,
        required = true,
        num_args = 1..,
        help = "Workload binaries to simulate"
    )]
    pub workload: Vec<PathBuf>,

    #[arg(long, required = true, help = "Control plane base URL")]
    pub server: String,

    #[arg(
        long,
        default_value = "experiments",
        help = "Directory under which the experiment directory is created"
    )]
    pub expdir: PathBuf,

    #[arg(long, default_value = "3600", help = "Simulation timeout in seconds")]
    pub timeout: u64,

    #[arg(
        long,
        help = "Additional ROI window 'start:end' for the performance summary (end -1 runs to completion)"
    )]
    pub roi: Option<String>,

    #[arg(long, default_value = "10", help = "Maximum status polling attempts")]
    pub poll_attempts: u32,

    #[arg(long, default_value = "2", help = "Seconds between polling attempts")]
    pub poll_interval: u64,
}

impl SubmitCommand {
    pub fn execute(self) -> Result<()> {
        let user = UserConfig::resolve(
            std::env::var(USER_CONFIG_ENV).ok().as_deref(),
            UserConfig::default_path().as_deref(),
        )?;

        let mut experiment = Experiment::create(&self.expdir, self.core.as_str())?;
        for path in &self.workload {
            experiment.add_workload(path)?;
        }
        info!("Created experiment {}", experiment.id());

        let mut reports = vec![ReportDescriptor::whole_run(
            ReportKind::PerfSummary,
            "summary",
            1000,
        )];
        if let Some(roi) = &self.roi {
            reports.push(parse_roi_descriptor(roi)?);
        }

        let config = ExperimentConfig {
            name: experiment.id().to_string(),
            core: self.core.clone(),
            workload: experiment
                .workloads()
                .iter()
                .map(|w| WorkloadEntry {
                    elf: w.name().to_string(),
                    zstf: None,
                })
                .collect(),
            uuid: Uuid::new_v4().to_string(),
            timeout: self.timeout,
            otp: otp::generate_secret(),
            reports,
            apikey: user.apikey.clone(),
            arch: self.arch.clone(),
        };

        let control = ControlPlaneClient::new(self.server.as_str(), user.clone())?;
        let endpoints =
            control.request_signed_endpoints(experiment.id(), &self.core, &self.arch)?;

        let poll_config = PollConfig {
            max_attempts: self.poll_attempts,
            interval: Duration::from_secs(self.poll_interval),
        };
        let pipeline = Pipeline::new(poll_config)?;
        let report = pipeline.run(&mut experiment, &config, &endpoints)?;

        println!("Experiment {} complete", experiment.id());
        println!("Results in {}", experiment.dir().display());
        if !report.cleaned_reports.is_empty() {
            println!(
                "Removed {} empty ROI summaries during validation",
                report.cleaned_reports.len()
            );
        }

        // Archive which local sources went into each workload.
        for workload in experiment.workloads() {
            let sources = snapshot_sources(workload.path())?;
            let list_path = experiment
                .dir()
                .join(format!("{}.sources", workload.name()));
            let mut file = fs::File::create(&list_path)?;
            let mut paths: Vec<_> = sources.iter().collect();
            paths.sort();
            for path in paths {
                writeln!(file, "{}", path.display())?;
            }
            println!(
                "Snapshotted {} sources for '{}' -> {}",
                sources.len(),
                workload.name(),
                list_path.display()
            );
        }

        Ok(())
    }
}

fn parse_roi_descriptor(window: &str) -> Result<ReportDescriptor> {
    let (start, end) = window
        .split_once(':')
        .ok_or_else(|| anyhow!("ROI window must be 'start:end', got '{}'", window))?;
    let start: u64 = start
        .parse()
        .map_err(|_| anyhow!("invalid ROI start '{}'", start))?;
    let end: i64 = end.parse().map_err(|_| anyhow!("invalid ROI end '{}'", end))?;
    Ok(ReportDescriptor::roi(
        ReportKind::PerfSummary,
        "summary_roi",
        start,
        end,
        1000,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roi_descriptor() {
        let descriptor = parse_roi_descriptor("1000:50000").unwrap();
        assert_eq!(descriptor.start, 1000);
        assert_eq!(descriptor.end, 50000);
        assert!(descriptor.roi);

        let open_ended = parse_roi_descriptor("1000:-1").unwrap();
        assert_eq!(open_ended.end, -1);

        assert!(parse_roi_descriptor("1000").is_err());
        assert!(parse_roi_descriptor("a:b").is_err());
    }
}
