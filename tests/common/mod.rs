//! Shared harness for the orchestrator tests: a recording process runner and a
//! reporter that captures every callback.

#![allow(dead_code)]

use kutos_installer::config_file::{InstallConfig, InstallOptions};
use kutos_installer::error::Result;
use kutos_installer::hardware::HardwareInfo;
use kutos_installer::installer::{InstallOutcome, Installer};
use kutos_installer::process::{CommandOutput, CommandSpec, ProcessRunner};
use kutos_installer::report::Reporter;
use kutos_installer::types::BootMode;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records rendered command lines; fails every command whose program matches `fail_program`
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    stdin: Mutex<Vec<String>>,
    fail_program: Option<(String, String)>,
    fail_call: Option<(String, String)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `program` exit 1 with `stderr`. Matches chroot-wrapped commands too.
    pub fn failing(program: &str, stderr: &str) -> Self {
        Self {
            fail_program: Some((program.to_string(), stderr.to_string())),
            ..Self::default()
        }
    }

    /// Make every command whose rendered line contains `needle` exit 1 with `stderr`
    pub fn failing_call(needle: &str, stderr: &str) -> Self {
        Self {
            fail_call: Some((needle.to_string(), stderr.to_string())),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stdin(&self) -> Vec<String> {
        self.stdin.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, cmd: &CommandSpec, stdin: Option<&str>) -> Result<CommandOutput> {
        let line = cmd.to_string();
        self.calls.lock().unwrap().push(line.clone());
        if let Some(input) = stdin {
            self.stdin.lock().unwrap().push(input.to_string());
        }

        if let Some((needle, stderr)) = &self.fail_call {
            if line.contains(needle.as_str()) {
                return Ok(CommandOutput {
                    stdout: String::new(),
                    stderr: stderr.clone(),
                    exit_code: Some(1),
                });
            }
        }

        if let Some((program, stderr)) = &self.fail_program {
            let effective = if cmd.program == "arch-chroot" {
                cmd.args.get(1).map(String::as_str)
            } else {
                Some(cmd.program.as_str())
            };
            if effective == Some(program.as_str()) {
                return Ok(CommandOutput {
                    stdout: String::new(),
                    stderr: stderr.clone(),
                    exit_code: Some(1),
                });
            }
        }
        Ok(CommandOutput::ok())
    }
}

/// Everything the reporter received
#[derive(Default)]
pub struct Captured {
    pub progress: Mutex<Vec<(f64, String, String)>>,
    pub lines: Mutex<Vec<String>>,
    pub done: Mutex<Vec<(bool, String)>>,
}

impl Captured {
    pub fn progress(&self) -> Vec<(f64, String, String)> {
        self.progress.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn done(&self) -> Vec<(bool, String)> {
        self.done.lock().unwrap().clone()
    }
}

pub fn capturing_reporter() -> (Reporter, Arc<Captured>) {
    let captured = Arc::new(Captured::default());
    let (p, l, d) = (
        Arc::clone(&captured),
        Arc::clone(&captured),
        Arc::clone(&captured),
    );
    let reporter = Reporter::new(
        move |fraction, phase, detail| {
            p.progress
                .lock()
                .unwrap()
                .push((fraction, phase.to_string(), detail.to_string()))
        },
        move |line| l.lines.lock().unwrap().push(line.to_string()),
        move |success, message| d.done.lock().unwrap().push((success, message.to_string())),
    );
    (reporter, captured)
}

/// A valid automatic-mode configuration targeting `/dev/sda`
pub fn auto_config() -> InstallConfig {
    InstallConfig {
        disk: "/dev/sda".to_string(),
        username: "ali".to_string(),
        password: "secret".to_string(),
        ..InstallConfig::default()
    }
}

pub fn options_for(mount_point: &Path) -> InstallOptions {
    InstallOptions {
        mount_point: mount_point.to_path_buf(),
        settle_delay: Duration::ZERO,
        ..InstallOptions::default()
    }
}

/// Run one install against `runner` with fixed hardware
pub fn run_install(
    config: InstallConfig,
    runner: Arc<RecordingRunner>,
    boot_mode: BootMode,
    mount_point: &Path,
) -> (InstallOutcome, Arc<Captured>) {
    let (reporter, captured) = capturing_reporter();
    let outcome = Installer::new(config, runner, reporter)
        .with_hardware(HardwareInfo {
            boot_mode,
            ram_gib: 4,
        })
        .with_options(options_for(mount_point))
        .run();
    (outcome, captured)
}
