//! Partition Executor
//!
//! Applies a [`PartitionPlan`] to its device. Every sub-step is one external
//! call; the first non-zero exit aborts with that tool's stderr.
//!
//! ```text
//! wipefs --all --force   → sgdisk --zap-all → parted mklabel
//!   → parted mkpart (per partition) → parted set (flags)
//!   → partprobe + settle → mkfs.fat / mkswap / mkfs.ext4
//! ```

use super::storage::{PartitionPlan, PartitionResult};
use crate::error::{InstallError, Result};
use crate::process::{CommandSpec, ProcessRunner, run_logged};
use crate::report::LogSink;
use crate::types::Filesystem;
use std::time::Duration;

/// Command that formats `node` with `filesystem`
pub fn format_command(filesystem: Filesystem, node: &str) -> CommandSpec {
    match filesystem {
        Filesystem::Fat32 => CommandSpec::new("mkfs.fat").args(["-F32", node]),
        Filesystem::Swap => CommandSpec::new("mkswap").arg(node),
        Filesystem::Ext4 => CommandSpec::new("mkfs.ext4").args(["-F", node]),
    }
}

/// Ordered partition-table commands for `plan` (everything before the rescan)
pub fn table_commands(plan: &PartitionPlan) -> Vec<CommandSpec> {
    let dev = plan.device.as_str();
    let parted = || CommandSpec::new("parted").args(["-s", dev]);

    let mut cmds = vec![
        CommandSpec::new("wipefs").args(["--all", "--force", dev]),
        CommandSpec::new("sgdisk").args(["--zap-all", dev]),
        parted().args(["mklabel", plan.boot_mode.table_label()]),
    ];

    for spec in &plan.partitions {
        cmds.push(parted().args([
            "mkpart".to_string(),
            spec.name.to_string(),
            spec.filesystem.to_string(),
            format!("{}MiB", spec.start_mib),
            spec.end.to_string(),
        ]));
    }

    for (i, spec) in plan.partitions.iter().enumerate() {
        for flag in &spec.flags {
            cmds.push(parted().args([
                "set".to_string(),
                (i + 1).to_string(),
                flag.as_str().to_string(),
                "on".to_string(),
            ]));
        }
    }
    cmds
}

/// Write `plan` to its device and format the new partitions.
///
/// Blocks for `settle` after `partprobe` so the kernel can create the nodes.
pub fn apply(
    runner: &dyn ProcessRunner,
    log: &LogSink,
    plan: &PartitionPlan,
    settle: Duration,
) -> Result<PartitionResult> {
    plan.validate()?;
    log.line(format!(
        "[DISK] Partitioning {} ({}, {} GiB swap)",
        plan.device,
        plan.boot_mode.table_label(),
        plan.swap_gib
    ));

    for cmd in table_commands(plan) {
        run_logged(runner, log, &cmd, true)?;
    }

    run_logged(runner, log, &CommandSpec::new("partprobe").arg(&plan.device), true)?;
    if !settle.is_zero() {
        log::debug!("Waiting {:?} for partition nodes to settle", settle);
        std::thread::sleep(settle);
    }

    let result = plan.result();
    for spec in &plan.partitions {
        let node = result.get(spec.role).ok_or_else(|| {
            InstallError::general(format!("no device node derived for {} partition", spec.role))
        })?;
        log.line(format!("[DISK] Formatting {} as {}", node, spec.filesystem));
        run_logged(runner, log, &format_command(spec.filesystem, node), true)?;
    }

    Ok(result)
}
