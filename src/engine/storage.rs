//! Partition Planner
//!
//! Translates a target device, boot mode and installed RAM into an ordered
//! [`PartitionPlan`], and derives the device nodes the kernel will create for it.
//!
//! # Layouts
//!
//! | Boot mode | Table | Partitions |
//! |-----------|-------|------------|
//! | UEFI | gpt | EFI 1MiB→513MiB (fat32, esp) · swap 513MiB→+swap · root →100% |
//! | BIOS | msdos | swap 1MiB→+swap · root →100% (boot flag) |
//!
//! Swap is `min(RAM, 8)` GiB. Root is always last and takes the rest of the disk.
//!
//! # Design
//!
//! - **Pure logic**: no I/O, no side effects. The executor applies the plan.
//! - **Validated**: `PartitionPlan::validate()` checks the layout invariants and
//!   runs before a plan is returned.

use crate::error::{InstallError, Result};
use crate::types::{BootMode, Filesystem, PartitionRole};
use std::collections::BTreeMap;
use std::fmt;

/// First usable MiB; keeps partitions 1 MiB aligned
pub const ALIGN_START_MIB: u64 = 1;
/// End of the 512 MiB EFI System Partition
pub const EFI_END_MIB: u64 = 513;
/// Upper bound for the swap partition
pub const MAX_SWAP_GIB: u64 = 8;

/// Where a partition ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Mib(u64),
    /// Rest of the device (`100%`)
    End,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mib(m) => write!(f, "{}MiB", m),
            Self::End => write!(f, "100%"),
        }
    }
}

/// Partition-table flag set after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionFlag {
    /// EFI System Partition
    Esp,
    /// Legacy active/boot flag
    Boot,
}

impl PartitionFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Esp => "esp",
            Self::Boot => "boot",
        }
    }
}

/// One partition in a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    pub role: PartitionRole,
    pub filesystem: Filesystem,
    /// Partition name (gpt) or type (`primary` on msdos) passed to `parted mkpart`
    pub name: &'static str,
    pub start_mib: u64,
    pub end: Boundary,
    pub flags: Vec<PartitionFlag>,
}

impl fmt::Display for PartitionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<4} {:<10} {}MiB -> {}",
            self.role, self.filesystem, self.start_mib, self.end
        )?;
        if !self.flags.is_empty() {
            let flags: Vec<&str> = self.flags.iter().map(|fl| fl.as_str()).collect();
            write!(f, " [{}]", flags.join(","))?;
        }
        Ok(())
    }
}

/// Ordered partition layout for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    pub device: String,
    pub boot_mode: BootMode,
    pub swap_gib: u64,
    pub partitions: Vec<PartitionSpec>,
}

impl PartitionPlan {
    /// 1-based partition number of `role`, if planned
    pub fn number_of(&self, role: PartitionRole) -> Option<usize> {
        self.partitions
            .iter()
            .position(|p| p.role == role)
            .map(|i| i + 1)
    }

    pub fn get(&self, role: PartitionRole) -> Option<&PartitionSpec> {
        self.partitions.iter().find(|p| p.role == role)
    }

    /// Device nodes the kernel will expose once the table is written
    pub fn result(&self) -> PartitionResult {
        let mut result = PartitionResult::default();
        for (i, spec) in self.partitions.iter().enumerate() {
            result.insert(spec.role, partition_node(&self.device, i + 1));
        }
        result
    }

    /// Check the layout invariants.
    ///
    /// - exactly one root, and it is last and runs to the end of the device
    /// - an EFI partition exists iff the boot mode is UEFI
    /// - start offsets strictly increase and each partition ends where the next starts
    pub fn validate(&self) -> Result<()> {
        let roots = self
            .partitions
            .iter()
            .filter(|p| p.role == PartitionRole::Root)
            .count();
        if roots != 1 {
            return Err(InstallError::precondition(format!(
                "plan must contain exactly one root partition, found {}",
                roots
            )));
        }
        match self.partitions.last() {
            Some(last) if last.role == PartitionRole::Root && last.end == Boundary::End => {}
            _ => {
                return Err(InstallError::precondition(
                    "root partition must be last and fill the rest of the disk",
                ));
            }
        }

        let has_efi = self.get(PartitionRole::Efi).is_some();
        if has_efi != self.boot_mode.is_uefi() {
            return Err(InstallError::precondition(format!(
                "EFI partition presence ({}) does not match boot mode {}",
                has_efi, self.boot_mode
            )));
        }

        for pair in self.partitions.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if b.start_mib <= a.start_mib {
                return Err(InstallError::precondition(format!(
                    "partition offsets not increasing: {} then {}",
                    a.start_mib, b.start_mib
                )));
            }
            if a.end != Boundary::Mib(b.start_mib) {
                return Err(InstallError::precondition(format!(
                    "{} partition ends at {} but {} starts at {}MiB",
                    a.role, a.end, b.role, b.start_mib
                )));
            }
        }
        Ok(())
    }

    /// Human-readable summary for logs and the `plan` command
    pub fn summary(&self) -> String {
        let result = self.result();
        let mut lines = vec![
            format!("Partition plan for {} ({})", self.device, self.boot_mode),
            format!("  Table: {}", self.boot_mode.table_label()),
            format!("  Swap: {} GiB", self.swap_gib),
        ];
        for spec in &self.partitions {
            let node = result.get(spec.role).unwrap_or("?");
            lines.push(format!("  {:<16} {}", node, spec));
        }
        lines.join("\n")
    }
}

/// Swap size in GiB: RAM, capped at [`MAX_SWAP_GIB`]; 0 is treated as 1.
pub fn swap_size_gib(ram_gib: u64) -> u64 {
    ram_gib.clamp(1, MAX_SWAP_GIB)
}

/// Compute the partition plan for `device`.
///
/// # Errors
///
/// Precondition error if `device` is empty.
pub fn plan(device: &str, boot_mode: BootMode, ram_gib: u64) -> Result<PartitionPlan> {
    let device = device.trim();
    if device.is_empty() {
        return Err(InstallError::precondition("no target device for automatic partitioning"));
    }

    let swap_gib = swap_size_gib(ram_gib);
    let swap_mib = swap_gib * 1024;
    let mut partitions = Vec::with_capacity(3);

    match boot_mode {
        BootMode::Uefi => {
            let swap_end = EFI_END_MIB + swap_mib;
            partitions.push(PartitionSpec {
                role: PartitionRole::Efi,
                filesystem: Filesystem::Fat32,
                name: "EFI",
                start_mib: ALIGN_START_MIB,
                end: Boundary::Mib(EFI_END_MIB),
                flags: vec![PartitionFlag::Esp],
            });
            partitions.push(PartitionSpec {
                role: PartitionRole::Swap,
                filesystem: Filesystem::Swap,
                name: "swap",
                start_mib: EFI_END_MIB,
                end: Boundary::Mib(swap_end),
                flags: vec![],
            });
            partitions.push(PartitionSpec {
                role: PartitionRole::Root,
                filesystem: Filesystem::Ext4,
                name: "root",
                start_mib: swap_end,
                end: Boundary::End,
                flags: vec![],
            });
        }
        BootMode::Bios => {
            let swap_end = ALIGN_START_MIB + swap_mib;
            partitions.push(PartitionSpec {
                role: PartitionRole::Swap,
                filesystem: Filesystem::Swap,
                name: "primary",
                start_mib: ALIGN_START_MIB,
                end: Boundary::Mib(swap_end),
                flags: vec![],
            });
            partitions.push(PartitionSpec {
                role: PartitionRole::Root,
                filesystem: Filesystem::Ext4,
                name: "primary",
                start_mib: swap_end,
                end: Boundary::End,
                flags: vec![PartitionFlag::Boot],
            });
        }
    }

    let plan = PartitionPlan {
        device: device.to_string(),
        boot_mode,
        swap_gib,
        partitions,
    };
    plan.validate()?;
    Ok(plan)
}

/// NVMe and eMMC/SD names end in a digit, so their partitions take a `p` infix
pub fn uses_p_separator(device: &str) -> bool {
    device.contains("nvme") || device.contains("mmcblk")
}

/// Device node of partition `number` on `device` (`/dev/sda` + 1 → `/dev/sda1`,
/// `/dev/nvme0n1` + 1 → `/dev/nvme0n1p1`)
pub fn partition_node(device: &str, number: usize) -> String {
    if uses_p_separator(device) {
        format!("{}p{}", device, number)
    } else {
        format!("{}{}", device, number)
    }
}

/// Whole-disk node a partition node belongs to; inverse of [`partition_node`].
pub fn parent_disk(node: &str) -> Option<String> {
    let stem = node.trim_end_matches(|c: char| c.is_ascii_digit());
    if stem.len() == node.len() {
        return None;
    }
    if uses_p_separator(node) {
        let disk = stem.strip_suffix('p')?;
        Some(disk.to_string())
    } else {
        Some(stem.to_string())
    }
}

/// Concrete device node per partition role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionResult {
    nodes: BTreeMap<PartitionRole, String>,
}

impl PartitionResult {
    /// Build from optional paths; empty strings count as absent
    pub fn from_paths(root: &str, efi: &str, swap: &str) -> Self {
        let mut result = Self::default();
        for (role, path) in [
            (PartitionRole::Root, root),
            (PartitionRole::Efi, efi),
            (PartitionRole::Swap, swap),
        ] {
            if !path.trim().is_empty() {
                result.insert(role, path.trim().to_string());
            }
        }
        result
    }

    pub fn insert(&mut self, role: PartitionRole, node: String) {
        self.nodes.insert(role, node);
    }

    pub fn get(&self, role: PartitionRole) -> Option<&str> {
        self.nodes.get(&role).map(String::as_str)
    }

    pub fn root(&self) -> Option<&str> {
        self.get(PartitionRole::Root)
    }

    pub fn efi(&self) -> Option<&str> {
        self.get(PartitionRole::Efi)
    }

    pub fn swap(&self) -> Option<&str> {
        self.get(PartitionRole::Swap)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PartitionRole, &str)> {
        self.nodes.iter().map(|(r, n)| (*r, n.as_str()))
    }
}
