//! GRUB installation and defaults

use super::write_file;
use crate::chroot::Chroot;
use crate::error::{InstallError, Result};
use crate::types::BootMode;

/// Menu timeout written to `/etc/default/grub`
pub const GRUB_TIMEOUT_SECS: u32 = 3;

/// Where `grub-install` writes for a given boot mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootTarget {
    /// x86_64-efi into the mounted ESP with this boot entry label
    Efi { bootloader_id: String },
    /// i386-pc into the MBR of this whole-disk device
    Bios { disk: String },
}

impl BootTarget {
    /// Pick the target for `boot_mode`. BIOS needs the whole-disk node.
    pub fn for_mode(boot_mode: BootMode, disk: &str, bootloader_id: &str) -> Result<Self> {
        match boot_mode {
            BootMode::Uefi => Ok(Self::Efi {
                bootloader_id: bootloader_id.to_string(),
            }),
            BootMode::Bios if disk.trim().is_empty() => Err(InstallError::precondition(
                "BIOS bootloader install needs a target disk",
            )),
            BootMode::Bios => Ok(Self::Bios {
                disk: disk.trim().to_string(),
            }),
        }
    }

    fn install_args(&self) -> Vec<String> {
        match self {
            Self::Efi { bootloader_id } => vec![
                "--target=x86_64-efi".into(),
                "--efi-directory=/boot/efi".into(),
                format!("--bootloader-id={}", bootloader_id),
                "--recheck".into(),
            ],
            Self::Bios { disk } => vec![
                "--target=i386-pc".into(),
                "--recheck".into(),
                disk.clone(),
            ],
        }
    }
}

/// Shorten the menu timeout and rebrand the distributor in an `/etc/default/grub` body
pub fn rewrite_grub_defaults(content: &str, distributor: &str) -> String {
    let timeout = format!("GRUB_TIMEOUT={}", GRUB_TIMEOUT_SECS);
    let distributor_line = format!("GRUB_DISTRIBUTOR=\"{}\"", distributor);
    let mut out: Vec<&str> = Vec::new();
    for line in content.split('\n') {
        if line == "GRUB_TIMEOUT=5" {
            out.push(&timeout);
        } else if line.starts_with("GRUB_DISTRIBUTOR=") {
            out.push(&distributor_line);
        } else {
            out.push(line);
        }
    }
    out.join("\n")
}

/// Install GRUB, adjust its defaults and regenerate `grub.cfg`.
pub fn install_grub(chroot: &Chroot<'_>, target: &BootTarget, distributor: &str) -> Result<()> {
    let log = chroot.log();
    match target {
        BootTarget::Efi { .. } => log.line("[GRUB] UEFI mode: installing x86_64-efi"),
        BootTarget::Bios { disk } => log.line(format!("[GRUB] BIOS mode: installing to {}", disk)),
    }

    let args = target.install_args();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    chroot.exec("grub-install", &args)?;

    let defaults = chroot.path("/etc/default/grub");
    if defaults.exists() {
        let content = std::fs::read_to_string(&defaults)?;
        write_file(&defaults, &rewrite_grub_defaults(&content, distributor))?;
    } else {
        log::warn!("{} missing, keeping GRUB defaults", defaults.display());
    }

    chroot.exec("grub-mkconfig", &["-o", "/boot/grub/grub.cfg"])?;
    log.line("[GRUB] Bootloader configured");
    Ok(())
}
