//! Blob upload and result download over signed URLs.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_LENGTH;

use crate::error::{Result, SimrelayError};

/// Fixed chunk size for streamed result downloads.
const DOWNLOAD_CHUNK_LEN: usize = 64 * 1024;

/// Synchronous HTTP transport for the pipeline.
pub struct TransportClient {
    client: Client,
}

impl TransportClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Uploads the encrypted blob with a single PUT to the signed URL.
    ///
    /// `Content-Length` is set explicitly to the blob size. Returns the
    /// number of bytes uploaded.
    pub fn upload(&self, url: &str, path: &Path) -> Result<u64> {
        let blob = fs::read(path)?;
        let len = blob.len() as u64;

        info!("Uploading {} ({} bytes)", path.display(), len);
        let response = self
            .client
            .put(url)
            .header(CONTENT_LENGTH, len)
            .body(blob)
            .send()
            .map_err(|e| SimrelayError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SimrelayError::Upload(format!(
                "signed URL rejected the upload with HTTP {}",
                response.status()
            )));
        }
        Ok(len)
    }

    /// Stream-downloads a result to `dest` in fixed-size chunks.
    ///
    /// Returns the number of bytes written.
    pub fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| SimrelayError::Download(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SimrelayError::Download(format!(
                "result URL returned HTTP {}",
                response.status()
            )));
        }

        let mut file = File::create(dest)?;
        let mut buffer = [0u8; DOWNLOAD_CHUNK_LEN];
        let mut total: u64 = 0;
        loop {
            let read = response.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])?;
            total += read as u64;
        }
        file.flush()?;

        debug!("Downloaded {} bytes to {}", total, dest.display());
        Ok(total)
    }
}
