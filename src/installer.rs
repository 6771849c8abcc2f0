//! Installation Orchestrator
//!
//! Runs the ten phases in order against one target, pushes progress before each
//! phase, and guarantees a single teardown on both the success and failure paths.
//!
//! # Phases
//!
//! | # | Stage | Work |
//! |---|-------|------|
//! | 1 | Partitioning | plan + apply (auto) or take the configured nodes (manual) |
//! | 2 | Mounting | mount root/EFI, swapon |
//! | 3 | InstallingBase | `pacstrap -K <mp> BASE_PACKAGES` |
//! | 4 | GeneratingFstab | `genfstab -U` |
//! | 5 | ConfiguringSystem | locale, timezone, hostname |
//! | 6 | InstallingDesktop | `pacman -S` desktop packages |
//! | 7 | InstallingExtras | `pacman -S` extras, or a logged skip |
//! | 8 | InstallingAurHelper | yay |
//! | 9 | InstallingBootloader | GRUB |
//! | 10 | ConfiguringUsers | user account, systemd units |
//!
//! The phase table is data: the step count and every progress fraction derive
//! from its length and each entry's position.
//!
//! # Threading
//!
//! [`Installer::run`] blocks. [`Installer::spawn`] moves the installer onto a
//! dedicated worker thread so an interactive surface stays responsive; the
//! reporter callbacks are then invoked from that thread.

use crate::chroot::Chroot;
use crate::config_file::{InstallConfig, InstallOptions};
use crate::configure::bootloader::{self, BootTarget};
use crate::configure::{aur, fstab, locale, services, user};
use crate::engine::{executor, mount, storage};
use crate::engine::{MountState, PartitionResult};
use crate::error::{ErrorKind, InstallError, Result};
use crate::hardware::HardwareInfo;
use crate::install_state::{InstallStage, InstallerContext};
use crate::process::{CommandSpec, ProcessRunner, run_logged};
use crate::process_guard::CancelToken;
use crate::profiles::BASE_PACKAGES;
use crate::report::{InstallationProgress, LogSink, Reporter};
use crate::types::PartitionMode;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Final result of a run, mirroring what was passed to `done`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub success: bool,
    /// Error text given to `done`; empty on success
    pub message: String,
    pub kind: Option<ErrorKind>,
    /// Stage that was running when the run failed
    pub failed_at: Option<InstallStage>,
}

/// State shared by the phases of one run
struct RunContext<'a> {
    config: &'a InstallConfig,
    options: &'a InstallOptions,
    hardware: HardwareInfo,
    runner: &'a dyn ProcessRunner,
    log: &'a LogSink,
    boot_target: BootTarget,
    partitions: Option<PartitionResult>,
    mounts: MountState,
}

impl<'a> RunContext<'a> {
    fn chroot(&self) -> Chroot<'a> {
        Chroot::new(self.runner, self.log, &self.options.mount_point)
    }

    fn pacman_install(&self, packages: &[&str]) -> Result<()> {
        let cmd = CommandSpec::new("pacman")
            .args(["-S", "--noconfirm", "--needed"])
            .args(packages.iter().copied());
        self.chroot().run(&cmd, true)?;
        Ok(())
    }
}

type PhaseFn = fn(&mut RunContext<'_>) -> Result<()>;

/// One row of the phase table
struct Phase {
    stage: InstallStage,
    detail: fn(&InstallConfig) -> String,
    run: PhaseFn,
}

const PHASES: [Phase; 10] = [
    Phase {
        stage: InstallStage::Partitioning,
        detail: |c| match c.partition_mode {
            PartitionMode::Auto => c.disk.clone(),
            PartitionMode::Manual => c.root_partition.clone(),
        },
        run: partition_phase,
    },
    Phase {
        stage: InstallStage::Mounting,
        detail: |_| "Format & Mount".to_string(),
        run: mount_phase,
    },
    Phase {
        stage: InstallStage::InstallingBase,
        detail: |_| "pacstrap (this may take a while)".to_string(),
        run: base_phase,
    },
    Phase {
        stage: InstallStage::GeneratingFstab,
        detail: |_| "/etc/fstab".to_string(),
        run: fstab_phase,
    },
    Phase {
        stage: InstallStage::ConfiguringSystem,
        detail: |_| "Language, timezone, hostname".to_string(),
        run: system_phase,
    },
    Phase {
        stage: InstallStage::InstallingDesktop,
        detail: |c| c.desktop.to_string(),
        run: desktop_phase,
    },
    Phase {
        stage: InstallStage::InstallingExtras,
        detail: |c| match c.extra_packages.len() {
            0 => "None selected, skipping".to_string(),
            n => format!("{} packages", n),
        },
        run: extras_phase,
    },
    Phase {
        stage: InstallStage::InstallingAurHelper,
        detail: |_| "AUR helper".to_string(),
        run: aur_phase,
    },
    Phase {
        stage: InstallStage::InstallingBootloader,
        detail: |_| "GRUB".to_string(),
        run: bootloader_phase,
    },
    Phase {
        stage: InstallStage::ConfiguringUsers,
        detail: |_| "Final step".to_string(),
        run: users_phase,
    },
];

// ============================================================================
// Phase implementations
// ============================================================================

fn partition_phase(ctx: &mut RunContext<'_>) -> Result<()> {
    let config = ctx.config;
    ctx.log.line(format!("[DISK] Mode: {}", config.partition_mode));

    let result = match config.partition_mode {
        PartitionMode::Auto => {
            ctx.log.line(format!("[DISK] Target disk: {}", config.disk));
            let plan = storage::plan(&config.disk, ctx.hardware.boot_mode, ctx.hardware.ram_gib)?;
            for line in plan.summary().lines() {
                ctx.log.line(format!("[DISK] {}", line.trim_start()));
            }
            executor::apply(ctx.runner, ctx.log, &plan, ctx.options.settle_delay)?
        }
        PartitionMode::Manual => {
            let parts = config.manual_partitions();
            for (role, node) in parts.iter() {
                ctx.log.line(format!("[DISK] Using {} partition {}", role, node));
            }
            parts
        }
    };

    ctx.partitions = Some(result);
    ctx.log.line("[DISK] Partitioning complete");
    Ok(())
}

fn mount_phase(ctx: &mut RunContext<'_>) -> Result<()> {
    let parts = ctx
        .partitions
        .as_ref()
        .ok_or_else(|| InstallError::precondition("no partitions to mount"))?;
    mount::mount(
        ctx.runner,
        ctx.log,
        parts,
        ctx.hardware.boot_mode,
        &ctx.options.mount_point,
        &mut ctx.mounts,
    )?;
    ctx.log.line("[MOUNT] Partitions mounted");
    Ok(())
}

fn base_phase(ctx: &mut RunContext<'_>) -> Result<()> {
    ctx.log.line("[PACSTRAP] Installing base packages");
    let cmd = CommandSpec::new("pacstrap")
        .arg("-K")
        .arg(ctx.options.mount_point.display().to_string())
        .args(BASE_PACKAGES.iter().copied());
    run_logged(ctx.runner, ctx.log, &cmd, true)?;
    ctx.log.line("[PACSTRAP] Base system installed");
    Ok(())
}

fn fstab_phase(ctx: &mut RunContext<'_>) -> Result<()> {
    fstab::generate_fstab(&ctx.chroot())
}

fn system_phase(ctx: &mut RunContext<'_>) -> Result<()> {
    let chroot = ctx.chroot();
    locale::configure_locale(&chroot, &ctx.config.language)?;
    locale::configure_timezone(&chroot, &ctx.config.timezone)?;
    locale::configure_hostname(&chroot, &ctx.config.hostname)
}

fn desktop_phase(ctx: &mut RunContext<'_>) -> Result<()> {
    let desktop = ctx.config.desktop;
    let packages = desktop.packages();
    ctx.log.line(format!(
        "[DE] Installing {} packages: {}...",
        desktop.to_string().to_uppercase(),
        packages.iter().take(5).copied().collect::<Vec<_>>().join(", ")
    ));
    ctx.pacman_install(packages)?;
    ctx.log.line(format!("[DE] {} installed", desktop.to_string().to_uppercase()));
    Ok(())
}

fn extras_phase(ctx: &mut RunContext<'_>) -> Result<()> {
    let extras = &ctx.config.extra_packages;
    if extras.is_empty() {
        ctx.log.line("[PKG] No extra packages selected, skipping");
        return Ok(());
    }
    ctx.log.line(format!("[PKG] Installing {} extra packages", extras.len()));
    let names: Vec<&str> = extras.iter().map(String::as_str).collect();
    ctx.pacman_install(&names)
}

fn aur_phase(ctx: &mut RunContext<'_>) -> Result<()> {
    aur::install_yay(&ctx.chroot(), &ctx.config.username)
}

fn bootloader_phase(ctx: &mut RunContext<'_>) -> Result<()> {
    bootloader::install_grub(&ctx.chroot(), &ctx.boot_target, &ctx.options.distributor)
}

fn users_phase(ctx: &mut RunContext<'_>) -> Result<()> {
    let chroot = ctx.chroot();
    let config = ctx.config;
    user::create_user(
        &chroot,
        &user::UserSpec {
            username: &config.username,
            password: &config.password,
            sudo: config.sudo,
            root_same_password: config.root_same_password,
        },
    )?;
    services::enable_services(&chroot, config.desktop.display_manager())
}

// ============================================================================
// Installer
// ============================================================================

/// One installation run
pub struct Installer {
    config: InstallConfig,
    options: InstallOptions,
    hardware: Option<HardwareInfo>,
    runner: Arc<dyn ProcessRunner>,
    reporter: Reporter,
    cancel: CancelToken,
}

impl Installer {
    /// Hardware is probed when the run starts unless set with [`Installer::with_hardware`].
    pub fn new(config: InstallConfig, runner: Arc<dyn ProcessRunner>, reporter: Reporter) -> Self {
        Self {
            config,
            options: InstallOptions::default(),
            hardware: None,
            runner,
            reporter,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_hardware(mut self, hardware: HardwareInfo) -> Self {
        self.hardware = Some(hardware);
        self
    }

    pub fn with_options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }

    /// Share a cancel flag; it is checked before each phase starts
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Total number of phases in a run
    pub fn step_count() -> usize {
        PHASES.len()
    }

    /// Run on a dedicated worker thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<InstallOutcome>> {
        std::thread::Builder::new()
            .name("kutos-install".to_string())
            .spawn(move || self.run())
    }

    /// Run all phases, tear down, and report through `done`.
    pub fn run(self) -> InstallOutcome {
        let log = self.reporter.log_sink().clone();

        if let Err(e) = self.config.validate() {
            let err = InstallError::config(format!("{:#}", e));
            log.line(format!("[ERROR] {}", err));
            return self.finish(Err(err), None);
        }

        let hardware = self.hardware.unwrap_or_else(HardwareInfo::detect);
        log.line(format!("[INFO] Boot mode: {}", hardware.boot_mode));
        log.line(format!("[INFO] Memory: {} GiB", hardware.ram_gib));

        // Resolved up front so a BIOS install without a disk fails before anything runs
        let disk = self.config.bootloader_disk().unwrap_or_default();
        let boot_target =
            match BootTarget::for_mode(hardware.boot_mode, &disk, &self.options.bootloader_id) {
                Ok(target) => target,
                Err(e) => {
                    log.line(format!("[ERROR] {} ({})", e, e.kind()));
                    return self.finish(Err(e), None);
                }
            };

        let mut state = InstallerContext::new();
        let mut ctx = RunContext {
            config: &self.config,
            options: &self.options,
            hardware,
            runner: self.runner.as_ref(),
            log: &log,
            boot_target,
            partitions: None,
            mounts: MountState::default(),
        };

        let result = self.run_phases(&mut ctx, &mut state);

        if let Err(e) = &result {
            log.line(format!("[ERROR] {} ({})", e, e.kind()));
            if let Err(te) = state.fail() {
                log::warn!("{}", te);
            }
        }

        // Single teardown point for both outcomes
        log::debug!("Releasing {:?}", ctx.mounts);
        mount::unmount_all(ctx.runner, &log, &mut ctx.mounts);

        if result.is_ok() {
            if let Err(e) = state.advance() {
                log::warn!("{}", e);
            }
            log.line("");
            log.line("=".repeat(50));
            log.line("  KutOS installation completed successfully!");
            log.line("  Remove the installation media and reboot.");
            log.line("=".repeat(50));
        }

        log::debug!("Run ended at {}", state.current_stage());
        let failed_at = state.failed_at();
        self.finish(result, failed_at)
    }

    fn run_phases(&self, ctx: &mut RunContext<'_>, state: &mut InstallerContext) -> Result<()> {
        let total = PHASES.len();
        for (i, phase) in PHASES.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(InstallError::general(format!(
                    "Installation cancelled before {}",
                    phase.stage
                )));
            }

            state.transition_to(phase.stage)?;
            self.reporter.progress(&InstallationProgress {
                completed: i + 1,
                total,
                phase: phase.stage.description().to_string(),
                detail: (phase.detail)(ctx.config),
            });

            let span = tracing::info_span!("phase", number = i + 1, stage = %phase.stage);
            let _entered = span.enter();
            (phase.run)(ctx)?;
        }
        Ok(())
    }

    fn finish(&self, result: Result<()>, failed_at: Option<InstallStage>) -> InstallOutcome {
        let outcome = match result {
            Ok(()) => InstallOutcome {
                success: true,
                message: String::new(),
                kind: None,
                failed_at: None,
            },
            Err(e) => InstallOutcome {
                success: false,
                message: e.to_string(),
                kind: Some(e.kind()),
                failed_at,
            },
        };
        self.reporter.done(outcome.success, &outcome.message);
        outcome
    }
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("hardware", &self.hardware)
            .finish_non_exhaustive()
    }
}
