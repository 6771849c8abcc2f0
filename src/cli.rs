use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// KutOS Installer - installation engine for KutOS (Arch-based)
#[derive(Parser)]
#[command(name = "kutos-installer")]
#[command(about = "Partition, bootstrap and configure a KutOS system")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full installation from a configuration file
    Install {
        /// Path to the JSON configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Confirm that the target disk may be erased
        #[arg(short, long)]
        yes: bool,

        /// Log every command instead of executing it
        #[arg(long)]
        dry_run: bool,

        /// Where the target root is mounted
        #[arg(long, default_value = "/mnt")]
        mount_point: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
    /// Print the automatic partition plan for a disk without touching it
    Plan {
        /// Whole-disk device (e.g., /dev/sda)
        #[arg(short, long)]
        disk: String,
        /// Boot mode; detected from the live system when omitted
        #[arg(short, long)]
        mode: Option<BootModeArg>,
        /// RAM in GiB used for swap sizing; detected when omitted
        #[arg(short, long)]
        ram: Option<u64>,
    },
    /// Show detected boot mode, memory and disks
    Probe,
    /// List base, desktop and optional packages
    Packages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BootModeArg {
    Uefi,
    Bios,
}

impl From<BootModeArg> for crate::types::BootMode {
    fn from(arg: BootModeArg) -> Self {
        match arg {
            BootModeArg::Uefi => Self::Uefi,
            BootModeArg::Bios => Self::Bios,
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
