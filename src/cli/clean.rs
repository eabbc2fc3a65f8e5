//! Clean command: purge empty ROI summaries from a report tree.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::ReportKind;
use crate::report::clean_summaries;

#[derive(Args)]
pub struct CleanCommand {
    #[arg(help = "Root of the unpacked reports tree")]
    pub reports: PathBuf,

    #[arg(long, default_value = "perf_summary", help = "Report kind to clean")]
    pub kind: ReportKind,
}

impl CleanCommand {
    pub fn execute(self) -> Result<()> {
        let deleted = clean_summaries(&self.reports, self.kind)?;
        if deleted.is_empty() {
            println!("No empty ROI summaries found");
        } else {
            for path in &deleted {
                println!("Deleted {}", path.display());
            }
        }
        Ok(())
    }
}
