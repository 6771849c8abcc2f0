//! KutOS Installer - command line entry point
//!
//! A thin headless surface over the library: it loads a configuration, asks for
//! confirmation, and renders the engine's progress and log callbacks on stdout.

use anyhow::Context;
use kutos_installer::cli::{Cli, Commands};
use kutos_installer::config_file::{InstallConfig, InstallOptions};
use kutos_installer::engine::storage;
use kutos_installer::hardware::{self, HardwareInfo};
use kutos_installer::installer::Installer;
use kutos_installer::process::{DryRunRunner, ProcessRunner, SystemRunner};
use kutos_installer::process_guard::{self, CancelToken, ChildRegistry, ProcessGuard};
use kutos_installer::profiles::{self, BASE_PACKAGES, PACKAGE_CATALOG};
use kutos_installer::report::{LogSink, Reporter};
use kutos_installer::sanity;
use kutos_installer::types::{BootMode, DesktopEnvironment, PartitionMode};
use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing_subscriber::EnvFilter;

/// Skips the root check in `install`; binaries are still verified.
const SKIP_ROOT_CHECK_ENV: &str = "KUTOS_SKIP_ROOT_CHECK";

/// Initialize tracing; `RUST_LOG` overrides the default `info` level.
/// `log` records from the library are bridged into the same subscriber.
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logger();
    let cli = Cli::parse_args();
    debug!("CLI arguments parsed");

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Install {
            config,
            yes,
            dry_run,
            mount_point,
        } => install(&config, yes, dry_run, mount_point),
        Commands::Plan { disk, mode, ram } => {
            let detected = HardwareInfo::detect();
            let boot_mode = mode.map(BootMode::from).unwrap_or(detected.boot_mode);
            let ram = ram.unwrap_or(detected.ram_gib);
            let plan = storage::plan(&disk, boot_mode, ram)?;
            plan.validate()?;
            println!("{}", plan.summary());
            Ok(())
        }
        Commands::Probe => probe(),
        Commands::Packages => {
            print_packages();
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> InstallConfig {
    info!("Loading configuration file: {:?}", path);
    let config = match InstallConfig::load_from_file(path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration file: {:#}", e);
            eprintln!("✗ Failed to load configuration file: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {:#}", e);
        eprintln!("✗ Configuration validation failed: {:#}", e);
        std::process::exit(1);
    }
    config
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path);
    info!("Configuration validation successful");
    println!("✓ Configuration file is valid: {:?}", config);
    Ok(())
}

fn install(path: &Path, yes: bool, dry_run: bool, mount_point: PathBuf) -> anyhow::Result<()> {
    let config = load_config(path);
    println!("✓ Configuration loaded and validated");

    let mut options = InstallOptions {
        mount_point,
        ..InstallOptions::default()
    };

    let cancel = CancelToken::new();
    let (runner, registry) = if dry_run {
        // Configuration files are still written, so keep them away from the real target
        options.mount_point =
            std::env::temp_dir().join(format!("kutos-dry-run-{}", std::process::id()));
        options.settle_delay = std::time::Duration::ZERO;
        println!(
            "Dry run: commands are logged, files go to {}",
            options.mount_point.display()
        );
        let runner = DryRunRunner::new(LogSink::new(|line| println!("{}", line)));
        (Arc::new(runner) as Arc<dyn ProcessRunner>, ChildRegistry::shared())
    } else {
        preflight();
        if !yes {
            eprintln!(
                "✗ This will erase {}. Re-run with --yes to continue.",
                describe_target(&config)
            );
            std::process::exit(1);
        }
        let runner = SystemRunner::new();
        let registry = runner.registry();
        (Arc::new(runner) as Arc<dyn ProcessRunner>, registry)
    };

    process_guard::init_signal_handlers(Arc::clone(&registry), cancel.clone())
        .context("Failed to install signal handlers")?;
    // Children still registered when this scope unwinds are terminated
    let _guard = ProcessGuard::new(registry);

    let reporter = Reporter::new(
        |fraction, phase, detail| {
            println!("[{:>3.0}%] {} - {}", fraction * 100.0, phase, detail);
        },
        |line| println!("{}", line),
        |success, message| {
            if success {
                println!("\n✓ Installation completed successfully!");
            } else {
                eprintln!("\n✗ Installation failed: {}", message);
            }
        },
    );

    info!("Starting installation");
    let handle = Installer::new(config, runner, reporter)
        .with_options(options)
        .with_cancel_token(cancel)
        .spawn()
        .context("Failed to start installer thread")?;

    let outcome = match handle.join() {
        Ok(outcome) => outcome,
        Err(_) => anyhow::bail!("Installer thread panicked"),
    };
    if !outcome.success {
        if let Some(stage) = outcome.failed_at {
            error!("Installation failed during {}", stage);
        }
        std::process::exit(1);
    }
    Ok(())
}

fn describe_target(config: &InstallConfig) -> String {
    match config.partition_mode {
        PartitionMode::Auto => format!("all data on {}", config.disk),
        PartitionMode::Manual => {
            format!("the contents of {}", config.root_partition)
        }
    }
}

/// Exit with a report when the live environment cannot run an install
fn preflight() {
    let mut result = sanity::verify_environment();
    if std::env::var_os(SKIP_ROOT_CHECK_ENV).is_some() {
        log::warn!("{} set, skipping root check", SKIP_ROOT_CHECK_ENV);
        result.is_root = true;
    }
    if !result.is_ok() {
        eprintln!("{}", result.report());
        std::process::exit(1);
    }
}

fn probe() -> anyhow::Result<()> {
    let hw = HardwareInfo::detect();
    println!("Boot mode: {}", hw.boot_mode);
    println!("Memory:    {} GiB", hw.ram_gib);
    println!("Swap:      {} GiB", storage::swap_size_gib(hw.ram_gib));

    let disks = hardware::list_disks(&SystemRunner::new())?;
    if disks.is_empty() {
        println!("Disks:     none found");
    } else {
        println!("Disks:");
        for disk in disks {
            println!("  {}", disk);
        }
    }
    Ok(())
}

fn print_packages() {
    println!("Base ({}):", BASE_PACKAGES.len());
    println!("  {}", BASE_PACKAGES.join(" "));
    for de in DesktopEnvironment::iter() {
        println!("\nDesktop {} (display manager: {}):", de, de.display_manager());
        println!("  {}", de.packages().join(" "));
    }
    for group in PACKAGE_CATALOG {
        println!("\n{}:", group.title);
        for p in group.packages {
            let mark = if p.recommended { "*" } else { " " };
            println!("  {} {:<20} {}", mark, p.name, p.description);
        }
    }
    println!("\n* recommended: {}", profiles::recommended_packages().join(" "));
}
