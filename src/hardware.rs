//! Hardware environment detection
//!
//! Detects firmware boot mode, installed memory and candidate target disks.
//! Boot mode and RAM are pure filesystem reads; disk discovery asks `lsblk`
//! through the injectable runner.
//!
//! # Design
//!
//! - **Never fails**: `detect_boot_mode()` and `total_ram_gib()` fall back to safe
//!   values (BIOS, 4 GiB) instead of returning errors
//! - **Testable halves**: parsing lives in pure functions (`parse_meminfo`,
//!   `parse_lsblk_json`) that take the raw text

use crate::error::Result;
use crate::process::{CommandSpec, ProcessRunner};
use crate::types::BootMode;
use anyhow::Context;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Directory the kernel exposes only when booted through UEFI firmware
pub const EFIVARS_PATH: &str = "/sys/firmware/efi/efivars";

/// RAM assumed when `/proc/meminfo` cannot be read
pub const DEFAULT_RAM_GIB: u64 = 4;

/// Aggregated probe results, captured once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareInfo {
    pub boot_mode: BootMode,
    pub ram_gib: u64,
}

impl HardwareInfo {
    pub fn detect() -> Self {
        let boot_mode = detect_boot_mode();
        let ram_gib = total_ram_gib();
        log::info!("Hardware detection: boot mode={}, ram={} GiB", boot_mode, ram_gib);
        Self { boot_mode, ram_gib }
    }
}

impl fmt::Display for HardwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Boot mode: {}, RAM: {} GiB", self.boot_mode, self.ram_gib)
    }
}

/// UEFI if the EFI variable interface exists, BIOS otherwise.
pub fn detect_boot_mode() -> BootMode {
    boot_mode_from(Path::new(EFIVARS_PATH))
}

fn boot_mode_from(efivars: &Path) -> BootMode {
    if efivars.is_dir() {
        BootMode::Uefi
    } else {
        BootMode::Bios
    }
}

/// Installed memory rounded up to whole GiB, or [`DEFAULT_RAM_GIB`] if unreadable.
pub fn total_ram_gib() -> u64 {
    match std::fs::read_to_string("/proc/meminfo") {
        Ok(text) => parse_meminfo(&text).unwrap_or_else(|| {
            log::warn!("MemTotal missing from /proc/meminfo, assuming {} GiB", DEFAULT_RAM_GIB);
            DEFAULT_RAM_GIB
        }),
        Err(e) => {
            log::warn!("Cannot read /proc/meminfo ({}), assuming {} GiB", e, DEFAULT_RAM_GIB);
            DEFAULT_RAM_GIB
        }
    }
}

/// Extract `MemTotal` (kB) and round up to GiB
pub fn parse_meminfo(text: &str) -> Option<u64> {
    let kib: u64 = text
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kib.div_ceil(1024 * 1024))
}

/// A whole-disk block device offered as an install target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    /// `/dev/<name>`
    pub path: String,
    pub size: String,
    pub model: String,
    /// Transport (sata, nvme, usb ...), uppercased; empty when unknown
    pub transport: String,
}

impl fmt::Display for BlockDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}  {}", self.path, self.size, self.model)?;
        if !self.transport.is_empty() {
            write!(f, " ({})", self.transport)?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    tran: Option<String>,
}

/// Parse `lsblk -J -d -o NAME,SIZE,MODEL,TYPE,TRAN`, keeping only disks
pub fn parse_lsblk_json(json: &str) -> anyhow::Result<Vec<BlockDevice>> {
    let parsed: LsblkOutput =
        serde_json::from_str(json).context("Failed to parse lsblk JSON output")?;

    Ok(parsed
        .blockdevices
        .into_iter()
        .filter(|d| d.kind.as_deref() == Some("disk"))
        .map(|d| BlockDevice {
            path: format!("/dev/{}", d.name),
            size: d.size.unwrap_or_else(|| "?".to_string()),
            model: d
                .model
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            transport: d.tran.unwrap_or_default().to_uppercase(),
        })
        .collect())
}

/// List candidate target disks via `lsblk`
pub fn list_disks(runner: &dyn ProcessRunner) -> Result<Vec<BlockDevice>> {
    let cmd = CommandSpec::new("lsblk").args(["-J", "-d", "-o", "NAME,SIZE,MODEL,TYPE,TRAN"]);
    let output = runner.run(&cmd, None)?;
    output.ensure_success(&cmd)?;
    parse_lsblk_json(&output.stdout)
        .map_err(|e| crate::error::InstallError::general(format!("{:#}", e)))
}
