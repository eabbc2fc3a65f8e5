//! Experiment identity, workloads and lifecycle.
//!
//! An experiment owns exactly one directory for its whole life; the
//! directory is created when the experiment is created and never reused
//! across runs. All pipeline artifacts (`config.json`, `workload.exp`,
//! the unpacked `reports/` tree) live underneath it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Lifecycle of an experiment as the pipeline advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Packaged,
    Uploaded,
    Polling,
    Ready,
    Failed,
    Unpacked,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Created => "created",
            Lifecycle::Packaged => "packaged",
            Lifecycle::Uploaded => "uploaded",
            Lifecycle::Polling => "polling",
            Lifecycle::Ready => "ready",
            Lifecycle::Failed => "failed",
            Lifecycle::Unpacked => "unpacked",
        };
        f.write_str(s)
    }
}

/// A workload binary to be simulated. Immutable once added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    path: PathBuf,
    name: String,
}

impl Workload {
    /// Registers a workload binary. The file must exist at add time.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(Error::Config(format!(
                "workload binary not found: {}",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::Config(format!("workload path has no file name: {}", path.display()))
            })?;
        Ok(Self { path, name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name under which the binary is stored in the package.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A single submission to the simulation service.
#[derive(Debug)]
pub struct Experiment {
    id: String,
    core: String,
    dir: PathBuf,
    workloads: Vec<Workload>,
    state: Lifecycle,
}

impl Experiment {
    /// Creates the experiment and its directory under `expdir`.
    ///
    /// The id is a local timestamp plus a short random suffix, so two runs
    /// started in the same second still get distinct directories. Creation
    /// fails if the directory already exists.
    pub fn create(expdir: &Path, core: impl Into<String>) -> Result<Self> {
        let suffix = Uuid::new_v4().simple().to_string();
        let id = format!(
            "{}-{}",
            Local::now().format("%Y%m%d-%H%M%S"),
            &suffix[..8]
        );

        fs::create_dir_all(expdir)?;
        let dir = expdir.join(&id);
        fs::create_dir(&dir).map_err(|e| {
            Error::Config(format!(
                "failed to create experiment directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        debug!("Created experiment directory: {}", dir.display());

        Ok(Self {
            id,
            core: core.into(),
            dir,
            workloads: Vec::new(),
            state: Lifecycle::Created,
        })
    }

    /// Adds a workload binary; fails if the file does not exist.
    pub fn add_workload(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let workload = Workload::new(path)?;
        debug!("Added workload '{}' to experiment {}", workload.name(), self.id);
        self.workloads.push(workload);
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn core(&self) -> &str {
        &self.core
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn workloads(&self) -> &[Workload] {
        &self.workloads
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn set_state(&mut self, state: Lifecycle) {
        debug!("Experiment {} state: {} -> {}", self.id, self.state, state);
        self.state = state;
    }

    /// Root of the unpacked report tree.
    pub fn reports_dir(&self) -> PathBuf {
        self.dir.join("reports")
    }
}
