//! Sequential pipeline from package assembly to report validation.
//!
//! One experiment, one directory, one pass: package → encrypt → upload →
//! poll → download → decrypt → unpack → validate. Every phase returns a
//! tagged error, so a failure in any of them reaches the caller with the
//! phase attached; nothing is logged-and-swallowed.

use std::fs;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::config::{ExperimentConfig, ReportKind};
use crate::crypto::{hybrid, otp};
use crate::error::{Error, Result};
use crate::experiment::{Experiment, Lifecycle};
use crate::package::{build_package, unpack_archive};
use crate::report::clean_summaries;
use crate::transport::poll::RESULT_TYPE_BYTE_STREAM;
use crate::transport::{
    HttpStatusSource, PollConfig, PollOutcome, Poller, SignedEndpoints, TransportClient,
};

/// What a completed pipeline run produced.
#[derive(Debug)]
pub struct PipelineReport {
    /// Path of the downloaded, decrypted and unpacked result archive
    pub result_archive: PathBuf,
    /// Invalid ROI summaries removed during validation
    pub cleaned_reports: Vec<PathBuf>,
}

/// Drives one experiment through the whole transport pipeline.
pub struct Pipeline {
    client: TransportClient,
    poll_config: PollConfig,
}

impl Pipeline {
    pub fn new(poll_config: PollConfig) -> Result<Self> {
        Ok(Self {
            client: TransportClient::new()?,
            poll_config,
        })
    }

    pub fn run(
        &self,
        experiment: &mut Experiment,
        config: &ExperimentConfig,
        endpoints: &SignedEndpoints,
    ) -> Result<PipelineReport> {
        config.validate()?;

        // Package
        let package_path = build_package(experiment.dir(), config, experiment.workloads())?;
        experiment.set_state(Lifecycle::Packaged);

        // Encrypt: the plaintext package is replaced by the blob in place.
        hybrid::encrypt_file(&endpoints.public_key_pem, &package_path)?;

        // Upload
        let uploaded = self.client.upload(&endpoints.upload_url, &package_path)?;
        experiment.set_state(Lifecycle::Uploaded);
        info!("Uploaded {} bytes for experiment {}", uploaded, experiment.id());

        // Poll
        experiment.set_state(Lifecycle::Polling);
        let source = HttpStatusSource::new(self.client.http(), endpoints.status_url.as_str());
        let outcome = Poller::new(source, self.poll_config.clone()).run()?;

        let descriptor = match outcome {
            PollOutcome::Ready(descriptor) => descriptor,
            other => {
                experiment.set_state(Lifecycle::Failed);
                let failure = other
                    .failure()
                    .ok_or_else(|| Error::Status("non-terminal poll outcome".into()))?;
                return Err(Error::Poll(failure));
            }
        };

        // Download
        if descriptor.kind != RESULT_TYPE_BYTE_STREAM {
            experiment.set_state(Lifecycle::Failed);
            return Err(Error::Download(format!(
                "unsupported result transport type '{}'",
                descriptor.kind
            )));
        }
        let result_path = experiment.dir().join(&descriptor.name);
        let downloaded = self.client.download(&descriptor.url, &result_path)?;
        experiment.set_state(Lifecycle::Ready);
        info!("Downloaded result '{}' ({} bytes)", descriptor.name, downloaded);

        // Decrypt with the one-time secret, then unpack over the
        // experiment directory.
        otp::decrypt_file(config.otp.as_bytes(), &result_path)?;
        unpack_archive(&result_path, experiment.dir())?;

        // The plaintext transport package has served its purpose.
        if let Err(e) = fs::remove_file(&package_path) {
            warn!("Could not remove transport package {}: {}", package_path.display(), e);
        }
        experiment.set_state(Lifecycle::Unpacked);

        // Validate: purge ROI summaries that captured no activity.
        let cleaned_reports = clean_summaries(&experiment.reports_dir(), ReportKind::PerfSummary)?;
        debug!(
            "Validation removed {} empty ROI summaries",
            cleaned_reports.len()
        );

        Ok(PipelineReport {
            result_archive: result_path,
            cleaned_reports,
        })
    }
}
