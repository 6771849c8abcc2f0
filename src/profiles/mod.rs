//! Package data for the target system.
//!
//! Package lists are kept in Rust so that a typo fails a test instead of a
//! half-finished install, and so the CLI can print them without touching a disk.
//!
//! # Desktop profiles
//!
//! | Desktop  | Display Manager |
//! |----------|-----------------|
//! | xfce     | lightdm |
//! | hyprland | sddm |
//! | gnome    | gdm |

use crate::types::DesktopEnvironment;

/// Installed by `pacstrap` before any chroot configuration
pub const BASE_PACKAGES: &[&str] = &[
    // Core
    "base",
    "linux",
    "linux-firmware",
    "linux-headers",
    // Boot
    "grub",
    "efibootmgr",
    "os-prober",
    // Microcode
    "amd-ucode",
    "intel-ucode",
    // Filesystems
    "btrfs-progs",
    "dosfstools",
    "e2fsprogs",
    "ntfs-3g",
    "xfsprogs",
    // Network
    "networkmanager",
    "dhcpcd",
    "wpa_supplicant",
    // Tools
    "base-devel",
    "git",
    "wget",
    "curl",
    "sudo",
    "nano",
    "vim",
    "zsh",
    "less",
    "man-db",
    "man-pages",
    "reflector",
    // Audio
    "pipewire",
    "pipewire-alsa",
    "pipewire-pulse",
    "wireplumber",
    // Fonts
    "ttf-dejavu",
    "noto-fonts",
    // X11
    "xorg-server",
    "xorg-xinit",
    "xorg-xrandr",
    // GPU
    "xf86-video-vesa",
    "xf86-video-amdgpu",
    "xf86-video-intel",
    "xf86-video-nouveau",
    "mesa",
];

impl DesktopEnvironment {
    /// Packages installed in the desktop phase. Includes the display manager.
    pub fn packages(self) -> &'static [&'static str] {
        match self {
            Self::Xfce => &[
                "xfce4",
                "xfce4-goodies",
                "lightdm",
                "lightdm-gtk-greeter",
                "lightdm-gtk-greeter-settings",
                "xfce4-terminal",
                "thunar",
                "thunar-archive-plugin",
                "thunar-volman",
                "mousepad",
                "ristretto",
                "xfce4-screenshooter",
                "network-manager-applet",
                "pavucontrol",
                "gvfs",
                "gvfs-mtp",
                "xdg-user-dirs",
                "xdg-utils",
            ],
            Self::Hyprland => &[
                "hyprland",
                "xdg-desktop-portal-hyprland",
                "waybar",
                "wofi",
                "foot",
                "swaybg",
                "swaylock",
                "swayidle",
                "grim",
                "slurp",
                "wl-clipboard",
                "mako",
                "thunar",
                "polkit-gnome",
                "network-manager-applet",
                "pavucontrol",
                "brightnessctl",
                "playerctl",
                "sddm",
                "qt5-graphicaleffects",
                "qt5-quickcontrols2",
                "gvfs",
                "gvfs-mtp",
                "xdg-user-dirs",
                "xdg-utils",
            ],
            Self::Gnome => &[
                "gnome",
                "gnome-tweaks",
                "gnome-themes-extra",
                "gdm",
                "networkmanager",
                "gvfs",
                "gvfs-mtp",
                "xdg-user-dirs",
                "xdg-utils",
            ],
        }
    }

    /// systemd unit of the login screen
    pub fn display_manager(self) -> &'static str {
        match self {
            Self::Xfce => "lightdm",
            Self::Hyprland => "sddm",
            Self::Gnome => "gdm",
        }
    }
}

/// One optional package offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalPackage {
    pub name: &'static str,
    pub description: &'static str,
    /// Pre-selected by default
    pub recommended: bool,
}

/// A titled group of optional packages
#[derive(Debug, Clone, Copy)]
pub struct PackageGroup {
    pub title: &'static str,
    pub packages: &'static [OptionalPackage],
}

const fn pkg(name: &'static str, description: &'static str, recommended: bool) -> OptionalPackage {
    OptionalPackage {
        name,
        description,
        recommended,
    }
}

/// The optional-package catalog
pub const PACKAGE_CATALOG: &[PackageGroup] = &[
    PackageGroup {
        title: "Internet",
        packages: &[
            pkg("firefox", "Firefox web browser", true),
            pkg("chromium", "Chromium web browser", false),
            pkg("thunderbird", "Thunderbird mail client", false),
            pkg("transmission-gtk", "Transmission BitTorrent client", false),
        ],
    },
    PackageGroup {
        title: "Office & Productivity",
        packages: &[
            pkg("libreoffice-fresh", "LibreOffice suite", false),
            pkg("evince", "PDF viewer", true),
            pkg("file-roller", "Archive manager", true),
        ],
    },
    PackageGroup {
        title: "Media & Graphics",
        packages: &[
            pkg("vlc", "VLC media player", false),
            pkg("gimp", "GIMP image editor", false),
            pkg("obs-studio", "OBS Studio", false),
            pkg("shotwell", "Photo manager", false),
        ],
    },
    PackageGroup {
        title: "Development",
        packages: &[
            pkg("code", "Visual Studio Code (OSS)", false),
            pkg("docker", "Docker container engine", false),
            pkg("nodejs", "Node.js runtime", false),
            pkg("python-pip", "Python pip", true),
            pkg("go", "Go programming language", false),
            pkg("rust", "Rust programming language", false),
        ],
    },
    PackageGroup {
        title: "Gaming",
        packages: &[
            pkg("steam", "Steam gaming platform", false),
            pkg("lutris", "Lutris game manager", false),
            pkg("wine", "Wine Windows compatibility layer", false),
        ],
    },
    PackageGroup {
        title: "System Tools",
        packages: &[
            pkg("htop", "htop process viewer", true),
            pkg("fastfetch", "Fastfetch system information", true),
            pkg("timeshift", "Timeshift backups", false),
            pkg("flatpak", "Flatpak package manager", false),
            pkg("bluez", "Bluetooth support", false),
            pkg("cups", "Printing support (CUPS)", false),
        ],
    },
];

/// Every catalog entry marked recommended, in catalog order
pub fn recommended_packages() -> Vec<&'static str> {
    PACKAGE_CATALOG
        .iter()
        .flat_map(|g| g.packages.iter())
        .filter(|p| p.recommended)
        .map(|p| p.name)
        .collect()
}
