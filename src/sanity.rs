//! Pre-flight sanity checks for the live environment
//!
//! Verified before a real install starts:
//! - every external tool the disk and base-system phases call is on `PATH`
//! - the process runs with root privileges (EUID 0)
//!
//! Tools that only run inside the target (`grub-install`, `useradd` ...) come
//! with the base packages and are not checked here.

use std::collections::BTreeSet;

/// Result of environment verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }

    /// Human-readable failure report; empty when all checks passed
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        if !self.is_root {
            lines.push("✗ Root privileges required".to_string());
            lines.push("  The installer partitions disks and runs pacstrap; run it as root.".to_string());
        }
        if !self.missing_binaries.is_empty() {
            lines.push("✗ Missing required binaries".to_string());
            for binary in &self.missing_binaries {
                lines.push(format!("  • {} (install: pacman -S {})", binary, package_for_binary(binary)));
            }
            let packages: BTreeSet<&str> = self
                .missing_binaries
                .iter()
                .map(|b| package_for_binary(b))
                .collect();
            let packages: Vec<&str> = packages.into_iter().collect();
            lines.push(format!("  Fix: pacman -S {}", packages.join(" ")));
        }
        lines.join("\n")
    }
}

/// Host tools needed before the chroot exists
pub const REQUIRED_BINARIES: &[&str] = &[
    "wipefs",      // util-linux
    "sgdisk",      // gptfdisk
    "parted",      // parted
    "partprobe",   // parted
    "mkfs.fat",    // dosfstools
    "mkswap",      // util-linux
    "mkfs.ext4",   // e2fsprogs
    "mount",       // util-linux
    "umount",      // util-linux
    "swapon",      // util-linux
    "swapoff",     // util-linux
    "lsblk",       // util-linux
    "pacstrap",    // arch-install-scripts
    "genfstab",    // arch-install-scripts
    "arch-chroot", // arch-install-scripts
];

/// Check if a binary is available in `PATH`
pub fn binary_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Perform all sanity checks
pub fn verify_environment() -> SanityCheckResult {
    let missing: Vec<String> = REQUIRED_BINARIES
        .iter()
        .filter(|b| !binary_exists(b))
        .map(|b| b.to_string())
        .collect();

    let result = SanityCheckResult {
        missing_binaries: missing,
        is_root: is_running_as_root(),
    };
    if result.is_ok() {
        log::info!("Pre-flight checks passed");
    } else {
        log::warn!(
            "Pre-flight checks failed: root={}, missing={:?}",
            result.is_root,
            result.missing_binaries
        );
    }
    result
}

/// Arch package providing `binary`
fn package_for_binary(binary: &str) -> &'static str {
    match binary {
        "sgdisk" => "gptfdisk",
        "parted" | "partprobe" => "parted",
        "mkfs.fat" => "dosfstools",
        "mkfs.ext4" => "e2fsprogs",
        "pacstrap" | "genfstab" | "arch-chroot" => "arch-install-scripts",
        _ => "util-linux",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_exists_sh() {
        assert!(binary_exists("sh"), "sh should be available");
    }

    #[test]
    fn test_binary_exists_nonexistent() {
        assert!(!binary_exists("this_binary_definitely_does_not_exist_12345"));
    }

    #[test]
    fn test_package_mapping() {
        assert_eq!(package_for_binary("sgdisk"), "gptfdisk");
        assert_eq!(package_for_binary("mkfs.ext4"), "e2fsprogs");
        assert_eq!(package_for_binary("arch-chroot"), "arch-install-scripts");
        assert_eq!(package_for_binary("wipefs"), "util-linux");
    }

    #[test]
    fn test_sanity_result_is_ok() {
        let ok_result = SanityCheckResult {
            missing_binaries: vec![],
            is_root: true,
        };
        assert!(ok_result.is_ok());
        assert!(ok_result.report().is_empty());

        let missing = SanityCheckResult {
            missing_binaries: vec!["pacstrap".to_string(), "genfstab".to_string()],
            is_root: true,
        };
        assert!(!missing.is_ok());
        assert!(missing.report().contains("pacman -S arch-install-scripts"));

        let not_root = SanityCheckResult {
            missing_binaries: vec![],
            is_root: false,
        };
        assert!(!not_root.is_ok());
        assert!(not_root.report().contains("Root privileges"));
    }

    #[test]
    fn test_report_lists_each_package_once() {
        let result = SanityCheckResult {
            missing_binaries: vec![
                "wipefs".to_string(),
                "pacstrap".to_string(),
                "mount".to_string(),
                "genfstab".to_string(),
                "swapon".to_string(),
            ],
            is_root: true,
        };
        let report = result.report();
        let fix = report
            .lines()
            .find(|l| l.trim_start().starts_with("Fix:"))
            .unwrap();
        assert_eq!(fix.trim(), "Fix: pacman -S arch-install-scripts util-linux");
    }

    #[test]
    fn test_verify_environment_reports_known_binaries_only() {
        let result = verify_environment();
        for missing in &result.missing_binaries {
            assert!(REQUIRED_BINARIES.contains(&missing.as_str()));
        }
    }
}
