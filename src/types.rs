//! Type-safe configuration types for the installer
//!
//! Stringly-typed wizard choices are parsed into these enums once, at the
//! configuration boundary, so the engine can match on them exhaustively.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Boot firmware mode, derived once per run from firmware inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum BootMode {
    #[strum(to_string = "UEFI")]
    Uefi,
    #[strum(to_string = "BIOS")]
    Bios,
}

impl BootMode {
    /// Returns true if the system booted in UEFI mode.
    pub fn is_uefi(self) -> bool {
        matches!(self, Self::Uefi)
    }

    /// Partition table label passed to `parted mklabel`
    pub fn table_label(self) -> &'static str {
        match self {
            Self::Uefi => "gpt",
            Self::Bios => "msdos",
        }
    }
}

/// How the target partitions are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PartitionMode {
    /// Wipe the target disk and lay out EFI/swap/root automatically
    #[default]
    Auto,
    /// Use partitions the user prepared beforehand
    Manual,
}

/// Desktop environment selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DesktopEnvironment {
    #[default]
    Xfce,
    Hyprland,
    Gnome,
}

/// Filesystem written to a partition by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter)]
pub enum Filesystem {
    /// FAT32 filesystem for the EFI System Partition
    #[strum(serialize = "fat32")]
    Fat32,
    #[strum(serialize = "linux-swap")]
    Swap,
    #[strum(serialize = "ext4")]
    Ext4,
}

/// Role a partition plays in the installed system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum PartitionRole {
    Efi,
    Swap,
    Root,
}
