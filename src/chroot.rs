//! Chroot Command Runner
//!
//! Runs commands inside the target via `arch-chroot <root>`, and resolves
//! target-absolute paths (`/etc/hostname`) to host paths under the mount point.

use crate::error::Result;
use crate::process::{CommandOutput, CommandSpec, ProcessRunner, run_logged, run_logged_with_input};
use crate::report::LogSink;
use std::path::{Path, PathBuf};

/// Tool that enters the target root
pub const CHROOT_TOOL: &str = "arch-chroot";

/// Borrowed view of one mounted target
#[derive(Clone, Copy)]
pub struct Chroot<'a> {
    runner: &'a dyn ProcessRunner,
    log: &'a LogSink,
    root: &'a Path,
}

impl<'a> Chroot<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, log: &'a LogSink, root: &'a Path) -> Self {
        Self { runner, log, root }
    }

    pub fn root(&self) -> &'a Path {
        self.root
    }

    pub fn log(&self) -> &'a LogSink {
        self.log
    }

    pub fn runner(&self) -> &'a dyn ProcessRunner {
        self.runner
    }

    /// Host path of a target-absolute path
    pub fn path(&self, target_path: &str) -> PathBuf {
        self.root.join(target_path.trim_start_matches('/'))
    }

    /// `cmd` wrapped as `arch-chroot <root> <cmd...>`
    pub fn wrap(&self, cmd: &CommandSpec) -> CommandSpec {
        CommandSpec::new(CHROOT_TOOL)
            .arg(self.root.display().to_string())
            .arg(&cmd.program)
            .args(cmd.args.iter().cloned())
    }

    /// Run `cmd` inside the target. With `check`, a non-zero exit is an error
    /// carrying the command line and stderr.
    pub fn run(&self, cmd: &CommandSpec, check: bool) -> Result<CommandOutput> {
        run_logged(self.runner, self.log, &self.wrap(cmd), check)
    }

    /// Shorthand for `run(cmd, true)`
    pub fn exec(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        self.run(&CommandSpec::new(program).args(args.iter().copied()), true)
    }

    /// Run `cmd` inside the target with `input` on stdin; always checked.
    pub fn run_with_input(&self, cmd: &CommandSpec, input: &str) -> Result<CommandOutput> {
        run_logged_with_input(self.runner, self.log, &self.wrap(cmd), input)
    }
}

impl std::fmt::Debug for Chroot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chroot").field("root", &self.root).finish()
    }
}
