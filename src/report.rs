//! Reporting interface between the engine and whatever surface embeds it.
//!
//! The orchestrator is handed one [`Reporter`] at construction. It is the only
//! writer; the three sinks may be read from any thread by the embedding surface.

use std::fmt;
use std::sync::Arc;

/// `progress(fraction, phase label, detail)`
pub type ProgressFn = dyn Fn(f64, &str, &str) + Send + Sync;
/// `log(line)`
pub type LogFn = dyn Fn(&str) + Send + Sync;
/// `done(success, error text)`
pub type DoneFn = dyn Fn(bool, &str) + Send + Sync;

/// Append-only line sink shared by every component of a run.
///
/// Cloning is cheap; all clones feed the same callback. Each line is also
/// mirrored to the `log` facade at debug level, so a surface that prints the
/// callback does not see every line twice at the default filter.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<LogFn>,
}

impl LogSink {
    pub fn new(f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(f) }
    }

    /// A sink that only forwards to the `log` facade
    pub fn null() -> Self {
        Self::new(|_| {})
    }

    /// Append one line
    pub fn line(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        log::debug!("{}", line);
        (self.inner)(line);
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink")
    }
}

/// Snapshot pushed to the progress sink at every phase boundary
#[derive(Debug, Clone, PartialEq)]
pub struct InstallationProgress {
    pub completed: usize,
    pub total: usize,
    pub phase: String,
    pub detail: String,
}

impl InstallationProgress {
    /// Completed fraction in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// The three callbacks an embedding surface provides
pub struct Reporter {
    progress: Box<ProgressFn>,
    log: LogSink,
    done: Box<DoneFn>,
}

impl Reporter {
    pub fn new(
        progress: impl Fn(f64, &str, &str) + Send + Sync + 'static,
        log: impl Fn(&str) + Send + Sync + 'static,
        done: impl Fn(bool, &str) + Send + Sync + 'static,
    ) -> Self {
        Self {
            progress: Box::new(progress),
            log: LogSink::new(log),
            done: Box::new(done),
        }
    }

    /// Reporter that discards everything except the `log` facade mirror
    pub fn silent() -> Self {
        Self::new(|_, _, _| {}, |_| {}, |_, _| {})
    }

    pub fn progress(&self, progress: &InstallationProgress) {
        log::debug!(
            "progress {}/{}: {} ({})",
            progress.completed,
            progress.total,
            progress.phase,
            progress.detail
        );
        (self.progress)(progress.fraction(), &progress.phase, &progress.detail);
    }

    pub fn log_sink(&self) -> &LogSink {
        &self.log
    }

    pub fn done(&self, success: bool, message: &str) {
        (self.done)(success, message);
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}
