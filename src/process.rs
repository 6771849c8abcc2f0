//! External command execution.
//!
//! Every privileged tool the engine needs is described as a [`CommandSpec`]
//! (program + ordered arguments) and handed to a [`ProcessRunner`]. Nothing in
//! the engine builds a shell string; arguments reach `execve` exactly as listed.
//!
//! # Runners
//!
//! | Runner | Use |
//! |--------|-----|
//! | [`SystemRunner`] | Real execution, process-group isolated, PID registered for cancellation, output streamed line by line |
//! | [`DryRunRunner`] | Logs what would run and reports success |
//!
//! Tests provide their own recording runner through the same trait.

use crate::error::{InstallError, Result};
use crate::process_guard::{ChildRegistry, CommandProcessGroup, SharedRegistry};
use crate::report::LogSink;
use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

/// A program and its argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `program arg1 arg2 ...` as a flat vector
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// Captured result of one external invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Successful, silent output
    pub fn ok() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit into `CommandFailed` carrying the command line and stderr
    pub fn ensure_success(&self, cmd: &CommandSpec) -> Result<()> {
        if self.success() {
            return Ok(());
        }
        Err(InstallError::CommandFailed {
            command: cmd.to_string(),
            code: self.exit_code.unwrap_or(-1),
            stderr: self.stderr.trim().to_string(),
        })
    }
}

/// Pipe a line of output was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Callback receiving output lines as they are produced, without the newline
pub type LineCallback<'a> = &'a mut dyn FnMut(OutputStream, &str);

/// Injectable process execution.
///
/// Implementations block until the process has exited. A non-zero exit is NOT an
/// error at this level; only failing to launch or wait is.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, cmd: &CommandSpec, stdin: Option<&str>) -> Result<CommandOutput>;

    /// Like [`ProcessRunner::run`], handing each output line to `on_line` while
    /// the process is still running. The returned output still holds everything.
    ///
    /// The default replays the captured output after the process has exited.
    fn run_streaming(
        &self,
        cmd: &CommandSpec,
        stdin: Option<&str>,
        on_line: LineCallback<'_>,
    ) -> Result<CommandOutput> {
        let output = self.run(cmd, stdin)?;
        for line in output.stdout.lines() {
            on_line(OutputStream::Stdout, line);
        }
        for line in output.stderr.lines() {
            on_line(OutputStream::Stderr, line);
        }
        Ok(output)
    }
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for Box<T> {
    fn run(&self, cmd: &CommandSpec, stdin: Option<&str>) -> Result<CommandOutput> {
        (**self).run(cmd, stdin)
    }

    fn run_streaming(
        &self,
        cmd: &CommandSpec,
        stdin: Option<&str>,
        on_line: LineCallback<'_>,
    ) -> Result<CommandOutput> {
        (**self).run_streaming(cmd, stdin, on_line)
    }
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for std::sync::Arc<T> {
    fn run(&self, cmd: &CommandSpec, stdin: Option<&str>) -> Result<CommandOutput> {
        (**self).run(cmd, stdin)
    }

    fn run_streaming(
        &self,
        cmd: &CommandSpec,
        stdin: Option<&str>,
        on_line: LineCallback<'_>,
    ) -> Result<CommandOutput> {
        (**self).run_streaming(cmd, stdin, on_line)
    }
}

/// Runs commands on the live system.
///
/// Each child gets its own process group and is registered for the duration of
/// the call, so a signal handler holding [`SystemRunner::registry`] can stop it.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    registry: SharedRegistry,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::shared(),
        }
    }

    pub fn registry(&self) -> SharedRegistry {
        std::sync::Arc::clone(&self.registry)
    }

    fn with_registry(&self, f: impl FnOnce(&mut ChildRegistry)) {
        if let Ok(mut guard) = self.registry.lock() {
            f(&mut guard);
        }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec, stdin: Option<&str>) -> Result<CommandOutput> {
        self.run_streaming(cmd, stdin, &mut |_, _| {})
    }

    fn run_streaming(
        &self,
        cmd: &CommandSpec,
        stdin: Option<&str>,
        on_line: LineCallback<'_>,
    ) -> Result<CommandOutput> {
        log::debug!("spawning: {}", cmd);

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .in_new_process_group();

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InstallError::CommandNotFound(cmd.program.clone())
            } else {
                InstallError::Io(e)
            }
        })?;
        let pid = child.id();
        self.with_registry(|r| r.register(pid));

        // Readers start before stdin is written so a chatty child cannot fill a pipe and stall
        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, OutputStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, OutputStream::Stderr, tx.clone()));
        }
        drop(tx);

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // Dropping the pipe afterwards delivers EOF
            if let Err(e) = pipe.write_all(input.as_bytes()) {
                log::warn!("Failed writing stdin to {}: {}", cmd.program, e);
            }
        }

        let mut output = CommandOutput::default();
        for (stream, line) in rx {
            on_line(stream, &line);
            let buf = match stream {
                OutputStream::Stdout => &mut output.stdout,
                OutputStream::Stderr => &mut output.stderr,
            };
            buf.push_str(&line);
            buf.push('\n');
        }
        for reader in readers {
            let _ = reader.join();
        }

        let status = child.wait();
        self.with_registry(|r| r.unregister(pid));
        output.exit_code = status?.code();
        Ok(output)
    }
}

/// Forward lines from `pipe` until EOF. Invalid UTF-8 is replaced, never fatal,
/// so the pipe keeps draining.
fn spawn_line_reader<R: Read + Send + 'static>(
    pipe: R,
    stream: OutputStream,
    tx: mpsc::Sender<(OutputStream, String)>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send((stream, line)).is_err() {
                        break; // Receiver dropped
                    }
                }
            }
        }
    })
}

/// Logs every command instead of running it
#[derive(Debug, Clone)]
pub struct DryRunRunner {
    log: LogSink,
}

impl DryRunRunner {
    pub fn new(log: LogSink) -> Self {
        Self { log }
    }
}

impl ProcessRunner for DryRunRunner {
    fn run(&self, cmd: &CommandSpec, _stdin: Option<&str>) -> Result<CommandOutput> {
        self.log.line(format!("  [dry-run] {}", cmd));
        Ok(CommandOutput::ok())
    }
}

/// Log one output line, stdout as `  line`, stderr as `  [stderr] line`. Blank lines are dropped.
pub fn log_output_line(log: &LogSink, stream: OutputStream, line: &str) {
    if line.trim().is_empty() {
        return;
    }
    match stream {
        OutputStream::Stdout => log.line(format!("  {}", line)),
        OutputStream::Stderr => log.line(format!("  [stderr] {}", line)),
    }
}

/// Run `cmd`, log the command line and stream its output, and optionally enforce exit 0.
pub fn run_logged(
    runner: &dyn ProcessRunner,
    log: &LogSink,
    cmd: &CommandSpec,
    check: bool,
) -> Result<CommandOutput> {
    log.line(format!("$ {}", cmd));
    let output = runner.run_streaming(cmd, None, &mut |stream, line| {
        log_output_line(log, stream, line)
    })?;
    if check {
        output.ensure_success(cmd)?;
    }
    Ok(output)
}

/// Like [`run_logged`] but feeds `input` on stdin. Always checks the exit status.
///
/// The input is never logged: it carries `user:password` pairs.
pub fn run_logged_with_input(
    runner: &dyn ProcessRunner,
    log: &LogSink,
    cmd: &CommandSpec,
    input: &str,
) -> Result<CommandOutput> {
    log.line(format!("$ {} < (stdin)", cmd));
    let output = runner.run_streaming(cmd, Some(input), &mut |stream, line| {
        log_output_line(log, stream, line)
    })?;
    output.ensure_success(cmd)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn capture() -> (LogSink, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let sink = LogSink::new(move |l| captured.lock().unwrap().push(l.to_string()));
        (sink, lines)
    }

    struct Fixed(CommandOutput);

    impl ProcessRunner for Fixed {
        fn run(&self, _cmd: &CommandSpec, _stdin: Option<&str>) -> Result<CommandOutput> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_command_spec_display() {
        let cmd = CommandSpec::new("parted")
            .args(["-s", "/dev/sda"])
            .arg("mklabel")
            .arg("gpt");
        assert_eq!(cmd.to_string(), "parted -s /dev/sda mklabel gpt");
        assert_eq!(cmd.argv(), vec!["parted", "-s", "/dev/sda", "mklabel", "gpt"]);
    }

    #[test]
    fn test_argument_with_spaces_stays_one_argument() {
        let cmd = CommandSpec::new("su").args(["kutos", "-c", "bash /tmp/x.sh"]);
        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.args[2], "bash /tmp/x.sh");
    }

    #[test]
    fn test_run_logged_forwards_output_then_fails() {
        let (sink, lines) = capture();
        let runner = Fixed(CommandOutput {
            stdout: "line one\nline two\n".into(),
            stderr: "boom\n".into(),
            exit_code: Some(2),
        });
        let cmd = CommandSpec::new("mkfs.ext4").args(["-F", "/dev/sda3"]);

        let err = run_logged(&runner, &sink, &cmd, true).unwrap_err();
        match err {
            InstallError::CommandFailed {
                command,
                code,
                stderr,
            } => {
                assert_eq!(command, "mkfs.ext4 -F /dev/sda3");
                assert_eq!(code, 2);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let lines = lines.lock().unwrap();
        assert_eq!(
            *lines,
            vec![
                "$ mkfs.ext4 -F /dev/sda3",
                "  line one",
                "  line two",
                "  [stderr] boom",
            ]
        );
    }

    #[test]
    fn test_run_logged_unchecked_tolerates_failure() {
        let (sink, _) = capture();
        let runner = Fixed(CommandOutput {
            exit_code: Some(1),
            ..CommandOutput::default()
        });
        let cmd = CommandSpec::new("systemctl").args(["mask", "cups.service"]);
        let out = run_logged(&runner, &sink, &cmd, false).unwrap();
        assert!(!out.success());
    }

    #[test]
    fn test_run_with_input_never_logs_payload() {
        let (sink, lines) = capture();
        let runner = Fixed(CommandOutput::ok());
        let cmd = CommandSpec::new("chpasswd");
        run_logged_with_input(&runner, &sink, &cmd, "kutos:hunter2").unwrap();
        assert!(lines.lock().unwrap().iter().all(|l| !l.contains("hunter2")));
    }

    #[test]
    fn test_signal_exit_maps_to_minus_one() {
        let out = CommandOutput {
            exit_code: None,
            ..CommandOutput::default()
        };
        let err = out.ensure_success(&CommandSpec::new("pacstrap")).unwrap_err();
        assert!(matches!(err, InstallError::CommandFailed { code: -1, .. }));
    }

    #[test]
    fn test_system_runner_captures_and_feeds_stdin() {
        let runner = SystemRunner::new();
        let out = runner.run(&CommandSpec::new("cat"), Some("hello")).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(runner.registry().lock().unwrap().count(), 0);
    }

    #[test]
    fn test_system_runner_streams_lines_while_running() {
        let runner = SystemRunner::new();
        let cmd = CommandSpec::new("sh").args(["-c", "echo one; echo two >&2; echo three; exit 3"]);
        let mut seen = Vec::new();

        let out = runner
            .run_streaming(&cmd, None, &mut |stream, line| seen.push((stream, line.to_string())))
            .unwrap();

        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout, "one\nthree\n");
        assert_eq!(out.stderr, "two\n");
        let stdout: Vec<&str> = seen
            .iter()
            .filter(|(s, _)| *s == OutputStream::Stdout)
            .map(|(_, l)| l.as_str())
            .collect();
        assert_eq!(stdout, vec!["one", "three"]);
        assert!(seen.contains(&(OutputStream::Stderr, "two".to_string())));
        assert_eq!(runner.registry().lock().unwrap().count(), 0);
    }

    #[test]
    fn test_first_line_arrives_before_exit() {
        use std::time::{Duration, Instant};

        let runner = SystemRunner::new();
        let cmd = CommandSpec::new("sh").args(["-c", "echo ready; sleep 1"]);
        let started = Instant::now();
        let mut first_at = None;

        runner
            .run_streaming(&cmd, None, &mut |_, _| {
                first_at.get_or_insert_with(|| started.elapsed());
            })
            .unwrap();

        let total = started.elapsed();
        let first_at = first_at.unwrap();
        assert!(first_at < Duration::from_millis(800), "first line after {:?}", first_at);
        assert!(total >= Duration::from_secs(1));
    }

    #[test]
    fn test_run_logged_streams_through_runner() {
        let (sink, lines) = capture();
        let runner = SystemRunner::new();
        let cmd = CommandSpec::new("sh").args(["-c", "echo building; echo warn >&2"]);

        run_logged(&runner, &sink, &cmd, true).unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(lines[0], "$ sh -c echo building; echo warn >&2");
        assert!(lines.contains(&"  building".to_string()));
        assert!(lines.contains(&"  [stderr] warn".to_string()));
    }

    #[test]
    fn test_system_runner_missing_binary() {
        let runner = SystemRunner::new();
        let err = runner
            .run(&CommandSpec::new("definitely-not-a-real-binary-kutos"), None)
            .unwrap_err();
        assert!(matches!(err, InstallError::CommandNotFound(_)));
    }

    #[test]
    fn test_dry_run_runner_logs_and_succeeds() {
        let (sink, lines) = capture();
        let runner = DryRunRunner::new(sink);
        let out = runner
            .run(&CommandSpec::new("wipefs").args(["--all", "/dev/vda"]), None)
            .unwrap();
        assert!(out.success());
        assert_eq!(*lines.lock().unwrap(), vec!["  [dry-run] wipefs --all /dev/vda"]);
    }
}
