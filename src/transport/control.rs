//! Boundary to the control-plane HTTP API.
//!
//! The control plane handles capability negotiation, core lookup and
//! signed-URL issuance; the pipeline consumes only the issued endpoints:
//! a PEM public key for the upload encryption, the upload URL and the
//! status-polling URL. A non-success response here is fatal to the run.

use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::UserConfig;
use crate::error::{Result, SimrelayError};

/// Signed endpoints issued by the control plane for one submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedEndpoints {
    /// Pre-signed single-use upload URL for the encrypted package
    #[serde(rename = "exppackageurl")]
    pub upload_url: String,
    /// PEM-encoded RSA public key the package must be encrypted for
    #[serde(rename = "publicKey")]
    pub public_key_pem: String,
    /// URL to poll for job status
    #[serde(rename = "statusget")]
    pub status_url: String,
}

/// Thin client for the signed-URL issuance endpoint.
pub struct ControlPlaneClient {
    client: Client,
    base_url: String,
    user: UserConfig,
}

impl ControlPlaneClient {
    pub fn new(base_url: impl Into<String>, user: UserConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user,
        })
    }

    /// Requests signed endpoints for an experiment submission.
    pub fn request_signed_endpoints(
        &self,
        experiment: &str,
        core: &str,
        arch: &str,
    ) -> Result<SignedEndpoints> {
        let url = format!("{}/signedurl", self.base_url);
        debug!("Requesting signed endpoints from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("name", experiment),
                ("core", core),
                ("arch", arch),
                ("apikey", self.user.apikey.as_str()),
                ("channel", self.user.channel.as_str()),
                ("region", self.user.region.as_str()),
            ])
            .send()?;

        if !response.status().is_success() {
            return Err(SimrelayError::ControlPlane(format!(
                "signed-URL request returned HTTP {}",
                response.status()
            )));
        }

        response.json::<SignedEndpoints>().map_err(|e| {
            SimrelayError::ControlPlane(format!("malformed signed-URL response: {}", e))
        })
    }
}
