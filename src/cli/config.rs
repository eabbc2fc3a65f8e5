//! Config command: create and inspect the local user configuration.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

use crate::config::{UserConfig, USER_CONFIG_ENV};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write the local configuration file
    Init(ConfigInitCommand),
    /// Show the resolved configuration
    Show(ConfigShowCommand),
}

#[derive(Args)]
pub struct ConfigInitCommand {
    #[arg(long, required = true)]
    pub apikey: String,

    #[arg(long, required = true)]
    pub channel: String,

    #[arg(long, required = true)]
    pub region: String,

    #[arg(long, help = "Write to this path instead of the default location")]
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct ConfigShowCommand {}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self.command {
            ConfigSubcommand::Init(cmd) => cmd.execute(),
            ConfigSubcommand::Show(cmd) => cmd.execute(),
        }
    }
}

impl ConfigInitCommand {
    pub fn execute(self) -> Result<()> {
        let path = match self.path {
            Some(path) => path,
            None => UserConfig::default_path()
                .ok_or_else(|| anyhow!("could not determine the config directory"))?,
        };
        let config = UserConfig {
            apikey: self.apikey,
            channel: self.channel,
            region: self.region,
        };
        config.save_to(&path)?;
        println!("Wrote {}", path.display());
        Ok(())
    }
}

impl ConfigShowCommand {
    pub fn execute(self) -> Result<()> {
        let config = UserConfig::resolve(
            std::env::var(USER_CONFIG_ENV).ok().as_deref(),
            UserConfig::default_path().as_deref(),
        )?;
        println!("apikey:  {}", mask(&config.apikey));
        println!("channel: {}", config.channel);
        println!("region:  {}", config.region);
        Ok(())
    }
}

fn mask(secret: &str) -> String {
    if secret.len() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", &secret[..4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_short_and_long() {
        assert_eq!(mask("ab"), "****");
        assert_eq!(mask("k-1234567"), "k-12****");
    }
}
