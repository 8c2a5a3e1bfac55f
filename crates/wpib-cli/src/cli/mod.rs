//! CLI for the WPIB backup fetch client.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wpib_core::config::{self, WpibConfig};

use commands::{run_backup, run_checksum, run_sites_list};

/// Top-level CLI for the WPIB backup fetch client.
#[derive(Debug, Parser)]
#[command(name = "wpib")]
#[command(about = "WPIB: fetch incremental WordPress backups and verify them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Back up all configured sites, or only the ones named with --site.
    Run {
        /// Site id from the config file (repeatable).
        #[arg(long = "site", value_name = "ID")]
        sites: Vec<String>,
        /// Config file to use instead of ~/.config/wpib/config.toml.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Override `backup_root` from the config file.
        #[arg(long, value_name = "PATH")]
        backup_root: Option<PathBuf>,
    },

    /// List configured sites.
    Sites {
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Compute the MD5 (or SHA-256) of a local file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        #[arg(long)]
        sha256: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<WpibConfig> {
    let cfg = match path {
        Some(p) => config::load_or_init_at(p)?,
        None => config::load_or_init()?,
    };
    tracing::debug!(sites = cfg.sites.len(), "loaded config");
    Ok(cfg)
}

impl CliCommand {
    /// Parse arguments and dispatch. `Ok(false)` means the command ran but
    /// at least one site failed.
    pub async fn run_from_args() -> Result<bool> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Run {
                sites,
                config,
                backup_root,
            } => {
                let mut cfg = load_config(config.as_ref())?;
                if let Some(root) = backup_root {
                    cfg.backup_root = root;
                }
                run_backup(cfg, sites).await
            }
            CliCommand::Sites { config } => {
                run_sites_list(&load_config(config.as_ref())?);
                Ok(true)
            }
            CliCommand::Checksum { path, sha256 } => {
                run_checksum(&path, sha256)?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests;
