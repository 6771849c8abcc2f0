//! User account creation

use super::write_file_mode;
use crate::chroot::Chroot;
use crate::error::Result;
use crate::process::CommandSpec;

/// Supplementary groups for the primary user
pub const USER_GROUPS: &str = "wheel,audio,video,storage,network,power";
/// Login shell for the primary user
pub const USER_SHELL: &str = "/bin/zsh";
/// Permanent wheel-group sudo grant (target-absolute)
pub const SUDOERS_DROP_IN: &str = "/etc/sudoers.d/00-kutos";

const SUDOERS_BODY: &str = "# KutOS sudo configuration\n%wheel ALL=(ALL:ALL) ALL\n";

/// Account settings for [`create_user`]
#[derive(Clone, Copy)]
pub struct UserSpec<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub sudo: bool,
    pub root_same_password: bool,
}

impl std::fmt::Debug for UserSpec<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSpec")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sudo", &self.sudo)
            .field("root_same_password", &self.root_same_password)
            .finish()
    }
}

/// Create the user, set passwords, grant sudo and create the XDG home directories.
pub fn create_user(chroot: &Chroot<'_>, user: &UserSpec<'_>) -> Result<()> {
    let log = chroot.log();
    log.line(format!("[USER] Creating user: {}", user.username));

    chroot.exec(
        "useradd",
        &["-m", "-G", USER_GROUPS, "-s", USER_SHELL, user.username],
    )?;

    let chpasswd = CommandSpec::new("chpasswd");
    chroot.run_with_input(&chpasswd, &format!("{}:{}", user.username, user.password))?;
    log.line("[USER] User password set");

    if user.root_same_password {
        chroot.run_with_input(&chpasswd, &format!("root:{}", user.password))?;
        log.line("[USER] Root password set to the user password");
    }

    if user.sudo {
        write_file_mode(&chroot.path(SUDOERS_DROP_IN), SUDOERS_BODY, 0o440)?;
        log.line("[USER] sudo granted to the wheel group");
    }

    chroot.exec("su", &["-", user.username, "-c", "xdg-user-dirs-update"])?;
    log.line("[USER] User directories created");
    Ok(())
}
