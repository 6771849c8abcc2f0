//! Mount Manager
//!
//! Assembles the target tree (root, EFI, swap) and tears it down again.
//! Teardown is the failure-recovery path, so [`unmount_all`] never returns an
//! error; anything that goes wrong there is reported as a `[CLEANUP]` log line.

use super::storage::PartitionResult;
use crate::error::{InstallError, Result};
use crate::process::{CommandSpec, ProcessRunner, run_logged};
use crate::report::LogSink;
use crate::types::BootMode;
use std::path::{Path, PathBuf};

/// EFI system partition location relative to the target root
pub const EFI_MOUNT_SUBDIR: &str = "boot/efi";

/// What the current run has mounted or activated.
///
/// Filled in one entry at a time as each step succeeds, so a failure halfway
/// through still leaves an accurate record for [`unmount_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountState {
    pub root: Option<(String, PathBuf)>,
    pub efi: Option<(String, PathBuf)>,
    pub swap: Option<String>,
}

impl MountState {
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.efi.is_none() && self.swap.is_none()
    }
}

/// Mount `result` under `mount_point`, recording each success in `state`.
///
/// Root is mandatory. EFI is only mounted in UEFI mode; swap is activated
/// whenever present.
///
/// # Errors
///
/// Precondition error (before any external call) when no root node is known.
pub fn mount(
    runner: &dyn ProcessRunner,
    log: &LogSink,
    result: &PartitionResult,
    boot_mode: BootMode,
    mount_point: &Path,
    state: &mut MountState,
) -> Result<()> {
    let root = result
        .root()
        .ok_or_else(|| InstallError::precondition("no root partition to mount"))?;

    let target = mount_point.display().to_string();

    std::fs::create_dir_all(mount_point)?;
    log.line(format!("[MOUNT] {} -> {}", root, target));
    run_logged(runner, log, &CommandSpec::new("mount").args([root, target.as_str()]), true)?;
    state.root = Some((root.to_string(), mount_point.to_path_buf()));

    if let Some(efi) = result.efi().filter(|_| boot_mode.is_uefi()) {
        let efi_dir = mount_point.join(EFI_MOUNT_SUBDIR);
        std::fs::create_dir_all(&efi_dir)?;
        let efi_target = efi_dir.display().to_string();
        log.line(format!("[MOUNT] {} -> {}", efi, efi_target));
        run_logged(runner, log, &CommandSpec::new("mount").args([efi, efi_target.as_str()]), true)?;
        state.efi = Some((efi.to_string(), efi_dir));
    }

    if let Some(swap) = result.swap() {
        log.line(format!("[MOUNT] Activating swap {}", swap));
        run_logged(runner, log, &CommandSpec::new("swapon").arg(swap), true)?;
        state.swap = Some(swap.to_string());
    }

    Ok(())
}

/// Release everything in `state`: swap first, then a recursive unmount of the
/// root mount point. Never fails; `state` is left empty.
pub fn unmount_all(runner: &dyn ProcessRunner, log: &LogSink, state: &mut MountState) {
    if state.is_empty() {
        log.line("[MOUNT] Nothing mounted, skipping teardown");
        return;
    }
    log.line("[MOUNT] Unmounting target");

    let mut steps = Vec::new();
    if let Some(swap) = state.swap.take() {
        steps.push(CommandSpec::new("swapoff").arg(swap));
    }
    // -R also releases the ESP mounted below root
    let efi = state.efi.take();
    match state.root.take() {
        Some((_, dir)) => steps.push(CommandSpec::new("umount").arg("-R").arg(dir.display().to_string())),
        None => {
            if let Some((_, dir)) = efi {
                steps.push(CommandSpec::new("umount").arg(dir.display().to_string()));
            }
        }
    }

    for cmd in &steps {
        match run_logged(runner, log, cmd, false) {
            Ok(output) if output.success() => {}
            Ok(output) => log.line(format!(
                "[CLEANUP] {} exited with {} (ignored)",
                cmd,
                output
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |c| c.to_string())
            )),
            Err(e) => log.line(format!("[CLEANUP] {} could not run: {} (ignored)", cmd, e)),
        }
    }
}
