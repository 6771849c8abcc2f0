//! systemd unit enablement

use crate::chroot::Chroot;
use crate::error::Result;
use crate::process::CommandSpec;

/// Masked to keep the default footprint small; failures are tolerated
pub const MASKED_UNITS: &[&str] = &["bluetooth.service", "cups.service", "avahi-daemon.service"];

/// Units enabled on every install, with the display manager inserted second
pub fn units_to_enable(display_manager: &str) -> [&str; 3] {
    ["NetworkManager", display_manager, "fstrim.timer"]
}

/// Enable networking, the display manager and the trim timer, then mask [`MASKED_UNITS`].
pub fn enable_services(chroot: &Chroot<'_>, display_manager: &str) -> Result<()> {
    let log = chroot.log();
    log.line("[SERVICES] Enabling services");

    for unit in units_to_enable(display_manager) {
        chroot.exec("systemctl", &["enable", unit])?;
        log.line(format!("[SERVICES] {} enabled", unit));
    }

    for unit in MASKED_UNITS {
        match chroot.run(&CommandSpec::new("systemctl").args(["mask", *unit]), false) {
            Ok(output) if output.success() => {}
            Ok(_) => log.line(format!("[SERVICES] Could not mask {} (ignored)", unit)),
            Err(e) => log.line(format!("[SERVICES] Could not mask {}: {} (ignored)", unit, e)),
        }
    }

    log.line("[SERVICES] Service configuration complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configure::test_support::{Recorder, capture};
    use crate::error::InstallError;
    use crate::process::{CommandOutput, ProcessRunner};
    use crate::report::LogSink;
    use std::sync::Mutex;

    /// Launches everything except `systemctl mask`, which cannot be started
    #[derive(Default)]
    struct MaskUnlaunchable {
        calls: Mutex<Vec<String>>,
    }

    impl ProcessRunner for MaskUnlaunchable {
        fn run(&self, cmd: &CommandSpec, _stdin: Option<&str>) -> Result<CommandOutput> {
            let line = cmd.to_string();
            self.calls.lock().unwrap().push(line.clone());
            if line.contains("systemctl mask") {
                return Err(InstallError::CommandNotFound(cmd.program.clone()));
            }
            Ok(CommandOutput::ok())
        }
    }

    #[test]
    fn test_enable_then_mask() {
        let runner = Recorder::default();
        let log = LogSink::null();
        let root = std::path::Path::new("/mnt");
        let chroot = Chroot::new(&runner, &log, root);

        enable_services(&chroot, "lightdm").unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "arch-chroot /mnt systemctl enable NetworkManager",
                "arch-chroot /mnt systemctl enable lightdm",
                "arch-chroot /mnt systemctl enable fstrim.timer",
                "arch-chroot /mnt systemctl mask bluetooth.service",
                "arch-chroot /mnt systemctl mask cups.service",
                "arch-chroot /mnt systemctl mask avahi-daemon.service",
            ]
        );
    }

    #[test]
    fn test_mask_failure_tolerated() {
        let runner = Recorder {
            fail_on: Some("mask cups"),
            ..Recorder::default()
        };
        let log = LogSink::null();
        let chroot = Chroot::new(&runner, &log, std::path::Path::new("/mnt"));

        enable_services(&chroot, "gdm").unwrap();
        assert_eq!(runner.calls().len(), 6);
    }

    #[test]
    fn test_enable_failure_aborts() {
        let runner = Recorder {
            fail_on: Some("enable sddm"),
            ..Recorder::default()
        };
        let log = LogSink::null();
        let chroot = Chroot::new(&runner, &log, std::path::Path::new("/mnt"));

        assert!(enable_services(&chroot, "sddm").is_err());
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn test_mask_launch_error_tolerated() {
        let runner = MaskUnlaunchable::default();
        let (log, lines) = capture();
        let chroot = Chroot::new(&runner, &log, std::path::Path::new("/mnt"));

        enable_services(&chroot, "lightdm").unwrap();

        assert_eq!(runner.calls.lock().unwrap().len(), 6);
        let lines = lines.lock().unwrap();
        let ignored = lines
            .iter()
            .filter(|l| l.starts_with("[SERVICES] Could not mask") && l.ends_with("(ignored)"))
            .count();
        assert_eq!(ignored, MASKED_UNITS.len());
        assert_eq!(lines.last().unwrap(), "[SERVICES] Service configuration complete");
    }
}
