//! The job-status polling state machine.
//!
//! After upload the job moves through `Submitted → Generating` on the
//! service side; this module drives a bounded poll loop against the
//! status URL until a terminal state is reached. Exhausting the attempt
//! budget while the job is still generating is its own terminal outcome,
//! never a silent fall-through.

use std::thread;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::error::{PollFailure, Result, SimrelayError};

/// Status code meaning the job is still generating.
pub const STATUS_GENERATING: u32 = 100;
/// Status code meaning the result is ready.
pub const STATUS_READY: u32 = 200;
/// Status code meaning the job id is unknown.
pub const STATUS_NOT_FOUND: u32 = 404;
/// Status code meaning the job failed.
pub const STATUS_FAILED: u32 = 500;

/// Result transport type for chunked byte-stream downloads.
pub const RESULT_TYPE_BYTE_STREAM: &str = "bytestream";

/// Descriptor of a finished result, as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResultDescriptor {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusMetadata {
    pub result: ResultDescriptor,
}

/// One response from the status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub code: u32,
    #[serde(default)]
    pub metadata: Option<StatusMetadata>,
}

/// Source of job status responses.
///
/// The HTTP implementation is [`HttpStatusSource`]; tests script
/// sequences of responses instead.
pub trait StatusSource {
    fn fetch(&mut self) -> Result<StatusResponse>;
}

/// Fetches status over HTTP from the control-plane-issued status URL.
pub struct HttpStatusSource<'a> {
    client: &'a reqwest::blocking::Client,
    url: String,
}

impl<'a> HttpStatusSource<'a> {
    pub fn new(client: &'a reqwest::blocking::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl StatusSource for HttpStatusSource<'_> {
    fn fetch(&mut self) -> Result<StatusResponse> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| SimrelayError::Status(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SimrelayError::Status(format!(
                "status endpoint returned HTTP {}",
                response.status()
            )));
        }
        let status = response
            .json::<StatusResponse>()
            .map_err(|e| SimrelayError::Status(format!("malformed status response: {}", e)))?;
        Ok(status)
    }
}

/// Polling attempt budget and cadence.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Maximum number of status requests before giving up
    pub max_attempts: u32,
    /// Pause between attempts
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(2),
        }
    }
}

/// Terminal outcome of a poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready(ResultDescriptor),
    NotFound,
    Failed,
    TimedOut { attempts: u32 },
}

impl PollOutcome {
    /// The failure this outcome maps to, if it is not `Ready`.
    pub fn failure(&self) -> Option<PollFailure> {
        match self {
            PollOutcome::Ready(_) => None,
            PollOutcome::NotFound => Some(PollFailure::NotFound),
            PollOutcome::Failed => Some(PollFailure::Failed),
            PollOutcome::TimedOut { attempts } => Some(PollFailure::TimedOut {
                attempts: *attempts,
            }),
        }
    }
}

/// Drives a [`StatusSource`] to a terminal [`PollOutcome`].
pub struct Poller<S: StatusSource> {
    source: S,
    config: PollConfig,
}

impl<S: StatusSource> Poller<S> {
    pub fn new(source: S, config: PollConfig) -> Self {
        Self { source, config }
    }

    /// Runs the poll loop, sleeping `interval` between attempts.
    pub fn run(&mut self) -> Result<PollOutcome> {
        let interval = self.config.interval;
        self.run_with_sleep(|_| thread::sleep(interval))
    }

    fn run_with_sleep<F: FnMut(Duration)>(&mut self, mut sleep: F) -> Result<PollOutcome> {
        for attempt in 1..=self.config.max_attempts {
            let status = self.source.fetch()?;
            debug!(
                "Poll attempt {}/{}: status code {}",
                attempt, self.config.max_attempts, status.code
            );

            match status.code {
                STATUS_GENERATING => sleep(self.config.interval),
                STATUS_READY => {
                    let descriptor = status
                        .metadata
                        .map(|m| m.result)
                        .ok_or_else(|| {
                            SimrelayError::Status(
                                "ready status carried no result descriptor".into(),
                            )
                        })?;
                    return Ok(PollOutcome::Ready(descriptor));
                }
                STATUS_NOT_FOUND => return Ok(PollOutcome::NotFound),
                STATUS_FAILED => return Ok(PollOutcome::Failed),
                other => {
                    return Err(SimrelayError::Status(format!(
                        "unexpected status code {}",
                        other
                    )))
                }
            }
        }

        warn!(
            "Job still generating after {} attempts, giving up",
            self.config.max_attempts
        );
        Ok(PollOutcome::TimedOut {
            attempts: self.config.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted status source counting how often it was asked.
    struct ScriptedSource {
        codes: Vec<u32>,
        fetches: usize,
    }

    impl ScriptedSource {
        fn new(codes: &[u32]) -> Self {
            Self {
                codes: codes.to_vec(),
                fetches: 0,
            }
        }
    }

    impl StatusSource for ScriptedSource {
        fn fetch(&mut self) -> Result<StatusResponse> {
            let code = self.codes[self.fetches];
            self.fetches += 1;
            let metadata = (code == STATUS_READY).then(|| StatusMetadata {
                result: ResultDescriptor {
                    name: "result.exp".to_string(),
                    url: "https://example.invalid/result".to_string(),
                    kind: RESULT_TYPE_BYTE_STREAM.to_string(),
                },
            });
            Ok(StatusResponse { code, metadata })
        }
    }

    fn fast_config(max_attempts: u32) -> PollConfig {
        PollConfig {
            max_attempts,
            interval: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_ready_on_third_attempt_with_two_sleeps() {
        let mut poller = Poller::new(
            ScriptedSource::new(&[100, 100, 200]),
            fast_config(10),
        );

        let mut sleeps = 0;
        let outcome = poller.run_with_sleep(|_| sleeps += 1).unwrap();

        match outcome {
            PollOutcome::Ready(descriptor) => {
                assert_eq!(descriptor.name, "result.exp");
                assert_eq!(descriptor.kind, RESULT_TYPE_BYTE_STREAM);
            }
            other => panic!("expected Ready, got {:?}", other),
        }
        assert_eq!(poller.source.fetches, 3);
        assert_eq!(sleeps, 2);
    }

    #[test]
    fn test_not_found_stops_after_one_attempt() {
        let mut poller = Poller::new(ScriptedSource::new(&[404, 100, 100]), fast_config(10));

        let mut sleeps = 0;
        let outcome = poller.run_with_sleep(|_| sleeps += 1).unwrap();

        assert_eq!(outcome, PollOutcome::NotFound);
        assert_eq!(poller.source.fetches, 1);
        assert_eq!(sleeps, 0);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut poller = Poller::new(ScriptedSource::new(&[100, 500]), fast_config(10));
        let outcome = poller.run_with_sleep(|_| {}).unwrap();
        assert_eq!(outcome, PollOutcome::Failed);
        assert_eq!(poller.source.fetches, 2);
    }

    #[test]
    fn test_exhaustion_reports_timeout() {
        let mut poller = Poller::new(ScriptedSource::new(&[100; 10]), fast_config(10));
        let outcome = poller.run_with_sleep(|_| {}).unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 10 });
        assert_eq!(poller.source.fetches, 10);
        assert_eq!(
            outcome.failure(),
            Some(crate::error::PollFailure::TimedOut { attempts: 10 })
        );
    }

    #[test]
    fn test_unexpected_code_is_protocol_error() {
        let mut poller = Poller::new(ScriptedSource::new(&[302]), fast_config(10));
        let err = poller.run_with_sleep(|_| {}).unwrap_err();
        assert_eq!(err.phase(), "poll");
    }

    #[test]
    fn test_status_response_json_shape() {
        let ready: StatusResponse = serde_json::from_str(
            r#"{"code": 200, "metadata": {"result": {"name": "r.exp", "url": "https://x", "type": "bytestream"}}}"#,
        )
        .unwrap();
        assert_eq!(ready.code, 200);
        assert_eq!(ready.metadata.unwrap().result.kind, "bytestream");

        let generating: StatusResponse = serde_json::from_str(r#"{"code": 100}"#).unwrap();
        assert!(generating.metadata.is_none());
    }
}
