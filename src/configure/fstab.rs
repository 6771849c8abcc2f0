//! `/etc/fstab` generation

use super::write_file;
use crate::chroot::Chroot;
use crate::error::Result;
use crate::process::CommandSpec;

/// Run `genfstab -U` against the mount point and write its output verbatim.
///
/// `genfstab` runs on the host, not inside the chroot: it reads the live mount table.
pub fn generate_fstab(chroot: &Chroot<'_>) -> Result<()> {
    let log = chroot.log();
    log.line("[FSTAB] Generating /etc/fstab");

    let cmd = CommandSpec::new("genfstab").args(["-U".to_string(), chroot.root().display().to_string()]);
    log.line(format!("$ {}", cmd));
    let output = chroot.runner().run(&cmd, None)?;
    // stdout is the table itself; only stderr goes to the log
    for line in output.stderr.trim().lines() {
        log.line(format!("  [stderr] {}", line));
    }
    output.ensure_success(&cmd)?;

    write_file(&chroot.path("/etc/fstab"), &output.stdout)?;
    log.line(format!(
        "[FSTAB] /etc/fstab written ({} entries)",
        output
            .stdout
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
            .count()
    ));
    Ok(())
}
