//! Transport package assembly and extraction.
//!
//! The transport unit is a gzip-compressed tar archive named
//! `workload.exp` containing the experiment configuration first, then each
//! workload binary under its base name. The result archive coming back
//! from the service is the same container format with a `reports/` tree
//! inside.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use tar::{Archive, Builder};

use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::experiment::Workload;

/// Fixed name of the configuration file inside the package.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Fixed name of the transport package inside the experiment directory.
pub const PACKAGE_FILE_NAME: &str = "workload.exp";

/// Writes `config.json` and assembles the transport package in `dir`.
///
/// Workload existence is re-checked here even though workloads were
/// validated at add time; time may have elapsed and a missing binary at
/// build time aborts the run with no archive produced.
pub fn build_package(
    dir: &Path,
    config: &ExperimentConfig,
    workloads: &[Workload],
) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, config.to_json()?)?;
    debug!("Wrote experiment config: {}", config_path.display());

    for workload in workloads {
        if !workload.path().is_file() {
            return Err(Error::Package(format!(
                "workload binary disappeared before packaging: {}",
                workload.path().display()
            )));
        }
    }

    let archive_path = dir.join(PACKAGE_FILE_NAME);
    let tar_gz = File::create(&archive_path)?;
    let enc = GzEncoder::new(tar_gz, Compression::default());
    let mut tar = Builder::new(enc);

    tar.append_path_with_name(&config_path, CONFIG_FILE_NAME)
        .map_err(|e| Error::Package(format!("failed to add config to package: {}", e)))?;

    for workload in workloads {
        tar.append_path_with_name(workload.path(), workload.name())
            .map_err(|e| {
                Error::Package(format!(
                    "failed to add workload '{}' to package: {}",
                    workload.name(),
                    e
                ))
            })?;
    }

    let enc = tar
        .into_inner()
        .map_err(|e| Error::Package(format!("failed to finalize package: {}", e)))?;
    enc.finish()
        .map_err(|e| Error::Package(format!("failed to finalize package: {}", e)))?;

    info!("Built transport package: {}", archive_path.display());
    Ok(archive_path)
}

/// Extracts a decrypted result archive fully into `dest`.
///
/// Existing files are overwritten, so re-running extraction is idempotent.
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<()> {
    let tar_gz = File::open(archive)?;
    let dec = GzDecoder::new(tar_gz);
    let mut tar = Archive::new(dec);
    tar.set_overwrite(true);

    tar.unpack(dest)
        .map_err(|e| Error::Unpack(format!("failed to extract {}: {}", archive.display(), e)))?;

    info!("Unpacked result archive into {}", dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReportDescriptor, ReportKind, WorkloadEntry};
    use std::io::Read;
    use tempfile::TempDir;

    fn sample_config(elf: &str) -> ExperimentConfig {
        ExperimentConfig {
            name: "exp-1".to_string(),
            core: "falcon-x2".to_string(),
            workload: vec![WorkloadEntry {
                elf: elf.to_string(),
                zstf: None,
            }],
            uuid: "u-1".to_string(),
            timeout: 600,
            otp: "cd".repeat(32),
            reports: vec![ReportDescriptor::whole_run(ReportKind::PerfSummary, "summary", 1000)],
            apikey: "k".to_string(),
            arch: "rv64gc".to_string(),
        }
    }

    #[test]
    fn test_build_and_unpack_round_trip() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bench");
        fs::write(&bin, b"binary-bytes").unwrap();
        let workload = Workload::new(&bin).unwrap();

        let exp_dir = tmp.path().join("exp");
        fs::create_dir(&exp_dir).unwrap();

        let archive = build_package(&exp_dir, &sample_config("bench"), &[workload]).unwrap();
        assert!(archive.ends_with(PACKAGE_FILE_NAME));

        let out = tmp.path().join("out");
        unpack_archive(&archive, &out).unwrap();

        assert_eq!(fs::read(out.join("bench")).unwrap(), b"binary-bytes");
        let mut config_json = String::new();
        File::open(out.join(CONFIG_FILE_NAME))
            .unwrap()
            .read_to_string(&mut config_json)
            .unwrap();
        let config: ExperimentConfig = serde_json::from_str(&config_json).unwrap();
        assert_eq!(config.workload[0].elf, "bench");
    }

    #[test]
    fn test_config_is_first_archive_entry() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bench");
        fs::write(&bin, b"x").unwrap();
        let workload = Workload::new(&bin).unwrap();

        let exp_dir = tmp.path().join("exp");
        fs::create_dir(&exp_dir).unwrap();
        let archive = build_package(&exp_dir, &sample_config("bench"), &[workload]).unwrap();

        let mut tar = Archive::new(GzDecoder::new(File::open(&archive).unwrap()));
        let first = tar.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(first.path().unwrap().to_string_lossy(), CONFIG_FILE_NAME);
    }

    #[test]
    fn test_workload_removed_between_add_and_build() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bench");
        fs::write(&bin, b"x").unwrap();
        let workload = Workload::new(&bin).unwrap();

        fs::remove_file(&bin).unwrap();

        let exp_dir = tmp.path().join("exp");
        fs::create_dir(&exp_dir).unwrap();
        let err = build_package(&exp_dir, &sample_config("bench"), &[workload]).unwrap_err();
        assert_eq!(err.phase(), "package");
        assert!(!exp_dir.join(PACKAGE_FILE_NAME).exists());
    }

    #[test]
    fn test_unpack_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bench");
        fs::write(&bin, b"bytes").unwrap();
        let workload = Workload::new(&bin).unwrap();

        let exp_dir = tmp.path().join("exp");
        fs::create_dir(&exp_dir).unwrap();
        let archive = build_package(&exp_dir, &sample_config("bench"), &[workload]).unwrap();

        let out = tmp.path().join("out");
        unpack_archive(&archive, &out).unwrap();
        unpack_archive(&archive, &out).unwrap();
        assert_eq!(fs::read(out.join("bench")).unwrap(), b"bytes");
    }
}
