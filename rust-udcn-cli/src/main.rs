use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use rust_udcn_pcct::{DiskConfig, PcctConfig};
use std::path::PathBuf;

mod commands;
mod utils;

/// µDCN PIT-CS composite table tools
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML, YAML or JSON)
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run Interest/Data rounds through a PCCT and print its counters
    Simulate {
        /// Number of distinct names
        #[clap(short, long, default_value = "1000")]
        names: usize,

        /// Number of rounds over all names
        #[clap(short, long, default_value = "2")]
        repeat: usize,

        /// Capacity of the direct CS list
        #[clap(long)]
        direct_capacity: Option<usize>,

        /// Capacity of the indirect CS list
        #[clap(long)]
        indirect_capacity: Option<usize>,

        /// Backing file for the disk tier
        #[clap(long)]
        disk: Option<PathBuf>,

        /// Number of disk slots
        #[clap(long, default_value = "1024")]
        disk_slots: u64,
    },

    /// Write Data packets to a file-backed disk store and read them back
    Disk {
        /// Backing file
        #[clap(short, long)]
        path: PathBuf,

        /// Number of Data packets
        #[clap(short, long, default_value = "100")]
        count: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" }
    )).init();

    let mut cfg = PcctConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    debug!("configuration: {:?}", cfg);

    match cli.command {
        Commands::Simulate {
            names,
            repeat,
            direct_capacity,
            indirect_capacity,
            disk,
            disk_slots,
        } => {
            if let Some(capacity) = direct_capacity {
                cfg.cs_direct_capacity = capacity;
            }
            if let Some(capacity) = indirect_capacity {
                cfg.cs_indirect_capacity = capacity;
            }
            if let Some(path) = disk {
                cfg.disk = Some(DiskConfig::new(path, disk_slots));
            }
            cfg.validate().context("Invalid configuration")?;
            commands::simulate::run_simulation(&cfg, names, repeat).await?;
        }
        Commands::Disk { path, count } => {
            commands::disk::run_disk_check(path, count).await?;
        }
    }

    Ok(())
}
