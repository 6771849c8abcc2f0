//! Locale, timezone and hostname

use super::write_file;
use crate::chroot::Chroot;
use crate::error::Result;

/// Locale that is always generated alongside the selected one
pub const FALLBACK_LOCALE: &str = "en_US.UTF-8";

/// `tr_TR.UTF-8` → `tr_TR`
pub fn locale_base(language: &str) -> &str {
    language.split('.').next().unwrap_or(language)
}

/// `locale.gen` entry for `language`
fn locale_entry(language: &str) -> String {
    format!("{} UTF-8", language)
}

/// Uncomment the entries for `language` and [`FALLBACK_LOCALE`] in a
/// `locale.gen` body. Every other line is returned unchanged.
pub fn enable_locales(content: &str, language: &str) -> String {
    let wanted = [locale_entry(language), locale_entry(FALLBACK_LOCALE)];
    let mut out: Vec<&str> = Vec::with_capacity(content.lines().count());
    for line in content.lines() {
        let uncommented = line.strip_prefix('#').filter(|rest| wanted.iter().any(|w| w == *rest));
        out.push(uncommented.unwrap_or(line));
    }
    let mut result = out.join("\n");
    if content.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Enable `language` in `/etc/locale.gen`, run `locale-gen` and write `/etc/locale.conf`.
pub fn configure_locale(chroot: &Chroot<'_>, language: &str) -> Result<()> {
    let log = chroot.log();
    log.line(format!(
        "[LOCALE] Setting language: {} ({})",
        language,
        locale_base(language)
    ));

    let locale_gen = chroot.path("/etc/locale.gen");
    let content = if locale_gen.exists() {
        enable_locales(&std::fs::read_to_string(&locale_gen)?, language)
    } else {
        format!("{}\n{}\n", locale_entry(language), locale_entry(FALLBACK_LOCALE))
    };
    write_file(&locale_gen, &content)?;

    chroot.exec("locale-gen", &[])?;
    write_file(&chroot.path("/etc/locale.conf"), &format!("LANG={}\n", language))?;
    log.line("[LOCALE] Locale configured");
    Ok(())
}

/// Point `/etc/localtime` at the zoneinfo entry for `timezone` and sync the hardware clock.
pub fn configure_timezone(chroot: &Chroot<'_>, timezone: &str) -> Result<()> {
    chroot.log().line(format!("[TZ] Setting timezone: {}", timezone));

    let localtime = chroot.path("/etc/localtime");
    // symlink_metadata also sees dangling links
    if localtime.symlink_metadata().is_ok() {
        std::fs::remove_file(&localtime)?;
    }

    let zone = format!("/usr/share/zoneinfo/{}", timezone);
    chroot.exec("ln", &["-sf", zone.as_str(), "/etc/localtime"])?;
    chroot.exec("hwclock", &["--systohc"])?;
    chroot.log().line("[TZ] Timezone configured");
    Ok(())
}

/// `/etc/hosts` body for `hostname`
pub fn hosts_file(hostname: &str) -> String {
    format!(
        "127.0.0.1\tlocalhost\n::1\t\tlocalhost\n127.0.1.1\t{h}.localdomain\t{h}\n",
        h = hostname
    )
}

/// Write `/etc/hostname` and `/etc/hosts`.
pub fn configure_hostname(chroot: &Chroot<'_>, hostname: &str) -> Result<()> {
    chroot.log().line(format!("[HOST] Setting hostname: {}", hostname));
    write_file(&chroot.path("/etc/hostname"), &format!("{}\n", hostname))?;
    write_file(&chroot.path("/etc/hosts"), &hosts_file(hostname))?;
    Ok(())
}
