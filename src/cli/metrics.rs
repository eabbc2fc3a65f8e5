//! Metrics command: inspect summary performance reports.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;

use crate::report::SummaryReport;

#[derive(Args)]
pub struct MetricsCommand {
    #[arg(help = "Path to a summary report JSON file")]
    pub report: PathBuf,

    #[arg(short, long, help = "Regular expression filtering metric names")]
    pub filter: Option<String>,

    #[arg(long, help = "Print a single metric's raw value")]
    pub metric: Option<String>,
}

impl MetricsCommand {
    pub fn execute(self) -> Result<()> {
        let report = SummaryReport::load(&self.report)?;

        if let Some(name) = &self.metric {
            let value = report
                .metric(name)
                .ok_or_else(|| anyhow!("no metric named '{}' in {}", name, self.report.display()))?;
            println!("{}", value);
            return Ok(());
        }

        print!("{}", report.render(self.filter.as_deref()));
        println!(
            "total cycles: {}, total instructions: {}",
            report.total_cycles(),
            report.total_instructions()
        );
        Ok(())
    }
}
