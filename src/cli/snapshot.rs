//! Snapshot command: list the local sources referenced by a binary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::snapshot::snapshot_sources;

#[derive(Args)]
pub struct SnapshotCommand {
    #[arg(help = "Workload binary to inspect")]
    pub binary: PathBuf,
}

impl SnapshotCommand {
    pub fn execute(self) -> Result<()> {
        let sources = snapshot_sources(&self.binary)?;
        let mut paths: Vec<_> = sources.iter().collect();
        paths.sort();
        for path in paths {
            println!("{}", path.display());
        }
        eprintln!("{} existing source files", sources.len());
        Ok(())
    }
}
