//! Installation configuration: the record the wizard hands to the engine.
//!
//! Stored as JSON. Every field has a default, so a file only needs the keys that
//! differ (typically `disk` and `password`).
//!
//! ```json
//! {
//!   "partition_mode": "auto",
//!   "disk": "/dev/vda",
//!   "desktop": "xfce",
//!   "username": "kutos",
//!   "password": "changeme",
//!   "extra_packages": ["firefox", "htop"]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::storage::{PartitionResult, parent_disk};
use crate::types::{DesktopEnvironment, PartitionMode};

/// Longest username `useradd` accepts
pub const MAX_USERNAME_LEN: usize = 32;
/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 4;

/// Everything the user chose in the wizard
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    // Disk
    pub partition_mode: PartitionMode,
    /// Whole-disk target (auto mode, and BIOS bootloader target)
    pub disk: String,
    /// Manual mode partitions; empty means "not used"
    pub root_partition: String,
    pub efi_partition: String,
    pub swap_partition: String,

    // Locale & time
    pub language: String,
    pub timezone: String,
    pub hostname: String,

    // User
    pub username: String,
    pub password: String,
    pub sudo: bool,
    pub root_same_password: bool,

    // Packages
    pub desktop: DesktopEnvironment,
    pub extra_packages: Vec<String>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            partition_mode: PartitionMode::Auto,
            disk: String::new(),
            root_partition: String::new(),
            efi_partition: String::new(),
            swap_partition: String::new(),
            language: "tr_TR.UTF-8".to_string(),
            timezone: "Europe/Istanbul".to_string(),
            hostname: "kutos".to_string(),
            username: "kutos".to_string(),
            password: String::new(),
            sudo: true,
            root_same_password: true,
            desktop: DesktopEnvironment::Xfce,
            extra_packages: Vec::new(),
        }
    }
}

impl std::fmt::Debug for InstallConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallConfig")
            .field("partition_mode", &self.partition_mode)
            .field("disk", &self.disk)
            .field("root_partition", &self.root_partition)
            .field("efi_partition", &self.efi_partition)
            .field("swap_partition", &self.swap_partition)
            .field("language", &self.language)
            .field("timezone", &self.timezone)
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sudo", &self.sudo)
            .field("root_same_password", &self.root_same_password)
            .field("desktop", &self.desktop)
            .field("extra_packages", &self.extra_packages)
            .finish()
    }
}

fn is_valid_username(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn is_valid_hostname(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl InstallConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.partition_mode {
            PartitionMode::Auto if self.disk.trim().is_empty() => {
                anyhow::bail!("A target disk must be selected for automatic partitioning");
            }
            PartitionMode::Manual if self.root_partition.trim().is_empty() => {
                anyhow::bail!("A root partition must be selected for manual partitioning");
            }
            _ => {}
        }

        if self.username.is_empty() {
            anyhow::bail!("Username must be specified");
        }
        if self.username.len() > MAX_USERNAME_LEN {
            anyhow::bail!("Username must be at most {} characters long", MAX_USERNAME_LEN);
        }
        if !is_valid_username(&self.username) {
            anyhow::bail!(
                "Username must start with a lowercase letter or '_' and contain only lowercase letters, digits, '_' and '-'"
            );
        }

        if self.password.is_empty() {
            anyhow::bail!("Password must be specified");
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            anyhow::bail!("Password must be at least {} characters long", MIN_PASSWORD_LEN);
        }
        // chpasswd reads one user:password pair per line
        if self.password.contains(['\n', '\r', ':']) {
            anyhow::bail!("Password cannot contain line breaks or ':'");
        }

        if !is_valid_hostname(&self.hostname) {
            anyhow::bail!("Hostname can only contain letters, digits and '-'");
        }

        if self.language.trim().is_empty() {
            anyhow::bail!("Language must be specified");
        }
        if self.timezone.trim().is_empty() {
            anyhow::bail!("Timezone must be specified");
        }

        for pkg in &self.extra_packages {
            // A leading '-' would reach pacman as an option
            let option_like = pkg.starts_with('-');
            if pkg.trim().is_empty() || pkg.chars().any(char::is_whitespace) || option_like {
                anyhow::bail!("Invalid extra package name {:?}", pkg);
            }
        }

        Ok(())
    }

    /// Partition nodes named in manual mode
    pub fn manual_partitions(&self) -> PartitionResult {
        PartitionResult::from_paths(&self.root_partition, &self.efi_partition, &self.swap_partition)
    }

    /// Whole disk for a legacy (BIOS) bootloader install.
    ///
    /// The configured disk, or in manual mode the disk holding the root partition.
    pub fn bootloader_disk(&self) -> Option<String> {
        let disk = self.disk.trim();
        if !disk.is_empty() {
            return Some(disk.to_string());
        }
        match self.partition_mode {
            PartitionMode::Manual => parent_disk(self.root_partition.trim()),
            PartitionMode::Auto => None,
        }
    }
}

/// Run-level settings that are not part of the wizard record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Where the target root is assembled
    pub mount_point: PathBuf,
    /// Pause after `partprobe` for device nodes to appear
    pub settle_delay: Duration,
    /// GRUB EFI boot entry label
    pub bootloader_id: String,
    /// `GRUB_DISTRIBUTOR` value
    pub distributor: String,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            mount_point: PathBuf::from("/mnt"),
            settle_delay: Duration::from_secs(2),
            bootloader_id: "KutOS".to_string(),
            distributor: "KutOS".to_string(),
        }
    }
}
