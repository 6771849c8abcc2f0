//! AUR helper (yay) bootstrap
//!
//! makepkg refuses to run as root and needs sudo for `-si`, so the build runs as
//! the new user with a throwaway NOPASSWD grant. Both the build script and the
//! grant are removed afterwards whatever the outcome.

use super::write_file_mode;
use crate::chroot::Chroot;
use crate::error::Result;
use crate::process::CommandSpec;

/// Build script location (target-absolute)
pub const BUILD_SCRIPT: &str = "/tmp/install-yay.sh";
/// Temporary password-less sudo grant (target-absolute)
pub const TEMP_SUDOERS: &str = "/etc/sudoers.d/99-installer-yay";
/// Package cloned from the AUR
pub const AUR_REPO: &str = "https://aur.archlinux.org/yay-bin.git";

/// Body of the build script
pub fn build_script() -> String {
    [
        "#!/bin/bash",
        "set -e",
        "cd /tmp",
        format!("git clone {}", AUR_REPO).as_str(),
        "cd yay-bin",
        "export MAKEFLAGS='-j$(nproc)'",
        "makepkg -si --noconfirm --needed",
        "cd /tmp && rm -rf yay-bin",
        "",
    ]
    .join("\n")
}

/// Build and install yay as `username` inside the target.
pub fn install_yay(chroot: &Chroot<'_>, username: &str) -> Result<()> {
    let log = chroot.log();
    log.line("[YAY] Installing the yay AUR helper");

    let script = chroot.path(BUILD_SCRIPT);
    let sudoers = chroot.path(TEMP_SUDOERS);

    let build = format!("bash {}", BUILD_SCRIPT);
    let result = (|| {
        write_file_mode(&script, &build_script(), 0o755)?;
        write_file_mode(&sudoers, &format!("{} ALL=(ALL) NOPASSWD: ALL\n", username), 0o440)?;
        chroot.run(&CommandSpec::new("su").args([username, "-c", build.as_str()]), true)
    })();

    for path in [&script, &sudoers] {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::debug!("Could not remove {}: {}", path.display(), e);
            }
        }
    }

    result?;
    log.line("[YAY] yay installed");
    Ok(())
}
