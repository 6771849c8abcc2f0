//! System Configurator
//!
//! Post-extraction configuration of the mounted target. Each action is a free
//! function over a [`Chroot`](crate::chroot::Chroot) plus the values it needs; none of them
//! keeps state between calls.
//!
//! | Module | Touches |
//! |--------|---------|
//! | `fstab` | `/etc/fstab` |
//! | `locale` | `/etc/locale.gen`, `/etc/locale.conf`, `/etc/localtime`, `/etc/hostname`, `/etc/hosts` |
//! | `user` | user account, passwords, `/etc/sudoers.d/00-kutos` |
//! | `aur` | `/tmp/install-yay.sh`, `/etc/sudoers.d/99-installer-yay` (both transient) |
//! | `bootloader` | GRUB install, `/etc/default/grub`, `/boot/grub/grub.cfg` |
//! | `services` | systemd unit enable/mask |

pub mod aur;
pub mod bootloader;
pub mod fstab;
pub mod locale;
pub mod services;
pub mod user;

use crate::error::Result;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Write `contents` to `path`, creating parent directories as needed
pub(crate) fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

/// Write `contents` to `path` and set its permission bits
pub(crate) fn write_file_mode(path: &Path, contents: &str, mode: u32) -> Result<()> {
    write_file(path, contents)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}
