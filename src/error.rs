use std::fmt;

use thiserror::Error;

/// Terminal polling outcomes that did not produce a result.
///
/// Poll exhaustion is deliberately distinct from the service-reported
/// terminal states so callers can tell "the job never finished generating"
/// apart from "the service rejected or lost the job".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollFailure {
    /// Service reported the job id as unknown (status 404).
    NotFound,
    /// Service reported the job as failed (status 500).
    Failed,
    /// All polling attempts were exhausted while the job was still generating.
    TimedOut { attempts: u32 },
}

impl fmt::Display for PollFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollFailure::NotFound => write!(f, "job not found on the service"),
            PollFailure::Failed => write!(f, "job failed on the service"),
            PollFailure::TimedOut { attempts } => {
                write!(f, "job still generating after {} polling attempts", attempts)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum SimrelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("control plane request failed: {0}")]
    ControlPlane(String),

    #[error("packaging failed: {0}")]
    Package(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("polling ended without a result: {0}")]
    Poll(PollFailure),

    #[error("status protocol error: {0}")]
    Status(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("decryption failed, the OTP may be wrong or the archive corrupt: {0}")]
    Decrypt(String),

    #[error("unpack failed: {0}")]
    Unpack(String),

    #[error("report validation failed: {0}")]
    Report(String),

    #[error("source snapshot failed: {0}")]
    Snapshot(String),
}

impl SimrelayError {
    /// Name of the pipeline phase this error belongs to.
    pub fn phase(&self) -> &'static str {
        match self {
            SimrelayError::Io(_) => "io",
            SimrelayError::Http(_) => "http",
            SimrelayError::Config(_) => "config",
            SimrelayError::ControlPlane(_) => "control",
            SimrelayError::Package(_) => "package",
            SimrelayError::Encrypt(_) => "encrypt",
            SimrelayError::Upload(_) => "upload",
            SimrelayError::Poll(_) | SimrelayError::Status(_) => "poll",
            SimrelayError::Download(_) => "download",
            SimrelayError::Decrypt(_) => "decrypt",
            SimrelayError::Unpack(_) => "unpack",
            SimrelayError::Report(_) => "validate",
            SimrelayError::Snapshot(_) => "snapshot",
        }
    }
}

pub type Error = SimrelayError;
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_failure_display() {
        assert_eq!(
            PollFailure::TimedOut { attempts: 10 }.to_string(),
            "job still generating after 10 polling attempts"
        );
        assert_eq!(PollFailure::NotFound.to_string(), "job not found on the service");
    }

    #[test]
    fn test_error_phase_names() {
        assert_eq!(SimrelayError::Encrypt("x".into()).phase(), "encrypt");
        assert_eq!(SimrelayError::Poll(PollFailure::Failed).phase(), "poll");
        assert_eq!(SimrelayError::Report("x".into()).phase(), "validate");
    }
}
