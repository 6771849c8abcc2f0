//! Process lifecycle management for external tools
//!
//! Every privileged tool the engine launches (parted, mkfs, pacstrap, arch-chroot ...)
//! is spawned in its own process group and recorded in a [`ChildRegistry`]. When the
//! installer is asked to stop, the whole group is signalled so a half-finished
//! `pacstrap` cannot keep writing to the target after the run has been declared failed.
//!
//! # Cancellation
//!
//! The engine has no mid-phase cancellation of its own. Stopping a run means:
//! 1. raise the [`CancelToken`] so no further phase starts,
//! 2. terminate the registered children (SIGTERM, grace period, then SIGKILL),
//! 3. let the failing external call surface as an error so the orchestrator's
//!    teardown path runs.
//!
//! [`init_signal_handlers`] wires SIGINT/SIGTERM/SIGHUP to exactly that sequence.

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shared handle to a registry
pub type SharedRegistry = Arc<Mutex<ChildRegistry>>;

/// Registry tracking spawned child processes (by PID, which is also their PGID)
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// Whether termination has already run (prevents double cleanup)
    cleanup_initiated: bool,
}

impl ChildRegistry {
    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        log::debug!("Registered child process PID {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        log::debug!("Unregistered child process PID {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate all tracked process groups.
    ///
    /// Sends SIGTERM, waits up to `grace_period`, then SIGKILLs survivors.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            log::debug!("Child termination already ran, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            return;
        }

        let pids: Vec<u32> = self.pids.iter().copied().collect();
        log::info!("Terminating {} external process(es)", pids.len());

        for &pid in &pids {
            if let Err(e) = signal_group(pid, Signal::SIGTERM) {
                log::warn!("SIGTERM to process group {} failed: {}", pid, e);
                let _ = signal_pid(pid, Signal::SIGTERM);
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if pids.iter().all(|&pid| !is_process_alive(pid)) {
                self.pids.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in pids.iter().filter(|&&pid| is_process_alive(pid)) {
            log::warn!("Process group {} ignored SIGTERM, sending SIGKILL", pid);
            if signal_group(pid, Signal::SIGKILL).is_err() {
                let _ = signal_pid(pid, Signal::SIGKILL);
            }
        }
        self.pids.clear();
    }
}

fn signal_pid(pid: u32, sig: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), sig)
}

/// Negative PID addresses the whole group, so grandchildren (mkfs under
/// arch-chroot, makepkg under su ...) are reached as well.
fn signal_group(pgid: u32, sig: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), sig)
}

/// Alive means: exists and is neither zombie nor dead
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // Field 3 is the state letter
        if let Some(state) = stat.split_whitespace().nth(2) {
            return !matches!(state, "Z" | "X");
        }
    }
    true
}

/// Cooperative stop flag checked by the orchestrator between phases
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// RAII guard that terminates all registered children on drop
pub struct ProcessGuard {
    registry: SharedRegistry,
}

impl ProcessGuard {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    pub fn child_count(&self) -> usize {
        self.registry.lock().map(|r| r.count()).unwrap_or(0)
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(Duration::from_secs(5));
        }
    }
}

/// Install SIGINT/SIGTERM/SIGHUP handling for an installation run.
///
/// The first signal cancels the run and terminates the registered children so the
/// orchestrator can fail and tear down. A second signal exits immediately.
pub fn init_signal_handlers(
    registry: SharedRegistry,
    cancel: CancelToken,
) -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            if cancel.is_cancelled() {
                log::warn!("Second signal {} received, exiting without teardown", sig);
                std::process::exit(128 + sig);
            }

            log::warn!("Signal {} received, cancelling installation", sig);
            cancel.cancel();
            if let Ok(mut registry) = registry.lock() {
                registry.terminate_all(Duration::from_secs(3));
            }
        }
    });

    Ok(())
}

/// Extension trait for `std::process::Command` to set up process groups
pub trait CommandProcessGroup {
    /// Run the command as leader of a new process group that dies with its parent
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: the closure only makes async-signal-safe syscalls (setpgid, prctl)
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;

                // An orphaned mkfs or pacstrap must not outlive the installer
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn reap(mut child: std::process::Child, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Ok(Some(_)) = child.try_wait() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_registry_register_unregister() {
        let mut registry = ChildRegistry::default();
        registry.register(1234);
        registry.register(5678);
        assert_eq!(registry.count(), 2);

        registry.unregister(1234);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_terminate_all_kills_process_group() {
        let child = Command::new("sleep")
            .arg("60")
            .in_new_process_group()
            .spawn()
            .expect("spawn sleep");
        let pid = child.id();

        let mut registry = ChildRegistry::default();
        registry.register(pid);
        registry.terminate_all(Duration::from_millis(500));

        assert!(reap(child, Duration::from_secs(2)), "sleep should be terminated");
        assert_eq!(registry.count(), 0);
    }

    // PIDs above the kernel's maximum pid_max never exist

    #[test]
    fn test_terminate_all_runs_once() {
        let mut registry = ChildRegistry::default();
        registry.register(4_194_401);
        registry.terminate_all(Duration::from_millis(10));
        assert!(registry.cleanup_initiated);

        registry.register(4_194_402);
        registry.terminate_all(Duration::from_millis(10));
        // Second call returned early and left the new entry alone
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_is_process_alive_nonexistent() {
        assert!(!is_process_alive(4_194_401));
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_process_guard_counts_children() {
        let registry = ChildRegistry::shared();
        registry.lock().unwrap().register(4_194_403);
        let guard = ProcessGuard::new(Arc::clone(&registry));
        assert_eq!(guard.child_count(), 1);
        registry.lock().unwrap().unregister(4_194_403);
    }
}
