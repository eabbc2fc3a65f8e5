//! Cryptography for the transport pipeline.
//!
//! Two distinct schemes, one per direction:
//!
//! - [`hybrid`] protects the upload: bulk AES-256-GCM under a random
//!   symmetric key, the key wrapped with the server's RSA public key.
//! - [`otp`] recovers the download: a per-experiment one-time secret,
//!   already delivered to the service inside the uploaded configuration,
//!   is stretched with scrypt and used for AES-256-ECB.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::Result;

pub mod hybrid;
pub mod otp;

/// Replaces `path` with `contents` without a window where neither the old
/// nor the new file exists: the bytes go to a temporary sibling which is
/// then renamed over the original.
pub(crate) fn replace_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()));

    let mut file = File::create(&tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_replace_keeps_original_name() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("payload.bin");
        fs::write(&path, b"old").unwrap();

        replace_file_atomic(&path, b"new contents").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new contents");
        // No temporary sibling left behind.
        let entries: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("payload.bin")]);
    }

    #[test]
    fn test_replace_creates_missing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fresh.bin");
        replace_file_atomic(&path, b"data").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"data");
    }
}
