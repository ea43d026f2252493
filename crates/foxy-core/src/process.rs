//! Asset manager command construction and execution.
//!
//! Commands are plain shell strings built from configuration
//! ([`CommandSpec`]) and executed through a [`ProcessExecutor`]. The executor
//! owns the ambient timeout; [`ProcessRunner::run`] overrides it for a single
//! call through a [`TimeoutGuard`] that restores the previous value when
//! dropped.

use std::cell::Cell;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use foxy_fs::NormalizedPath;

use crate::config::Config;
use crate::error::Result;

/// Timeout applied by [`ShellExecutor`] until overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Exit code reported for a process killed on timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output is still collected after a timeout kill.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Result of one command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs shell command lines.
///
/// A non-zero exit code is a normal outcome, not an error; errors are
/// reserved for failing to start or observe the process.
pub trait ProcessExecutor {
    fn execute(&self, command: &str, cwd: &NormalizedPath) -> Result<ProcessOutput>;

    /// Current timeout; `None` waits forever.
    fn timeout(&self) -> Option<Duration>;

    /// Replace the timeout, returning the previous one.
    fn set_timeout(&self, timeout: Option<Duration>) -> Option<Duration>;
}

/// Scoped timeout override.
///
/// The previous timeout is restored when the guard is dropped, including
/// during unwinding and on early `?` returns.
pub struct TimeoutGuard<'a> {
    executor: &'a dyn ProcessExecutor,
    previous: Option<Duration>,
}

impl<'a> TimeoutGuard<'a> {
    pub fn new(executor: &'a dyn ProcessExecutor, timeout: Option<Duration>) -> Self {
        let previous = executor.set_timeout(timeout);
        Self { executor, previous }
    }
}

impl Drop for TimeoutGuard<'_> {
    fn drop(&mut self) {
        self.executor.set_timeout(self.previous);
    }
}

/// Build a shell [`Command`] that executes `cmd_str` via the system shell.
///
/// - Unix: `sh -c "{cmd_str}"`, leading its own process group
/// - Windows: `cmd /C "{cmd_str}"`
fn shell_command(cmd_str: &str) -> Command {
    #[cfg(windows)]
    {
        let mut c = Command::new("cmd");
        c.args(["/C", cmd_str]);
        c
    }
    #[cfg(not(windows))]
    {
        use std::os::unix::process::CommandExt;

        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_str).process_group(0);
        c
    }
}

/// [`ProcessExecutor`] backed by the system shell.
///
/// Output is captured on helper threads so a chatty child cannot block on a
/// full pipe while the parent polls for its exit.
#[derive(Debug)]
pub struct ShellExecutor {
    timeout: Cell<Option<Duration>>,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            timeout: Cell::new(Some(DEFAULT_TIMEOUT)),
        }
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Output of a drain thread, waiting at most `wait` when given.
///
/// A descendant that outlives the shell keeps the pipe open, so a bounded
/// wait returns an empty string instead of blocking.
fn collect(output: &Receiver<String>, wait: Option<Duration>) -> String {
    match wait {
        Some(wait) => output.recv_timeout(wait).unwrap_or_default(),
        None => output.recv().unwrap_or_default(),
    }
}

/// Kill the child and every process in its group.
fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Err(err) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
            tracing::debug!(pid = child.id(), error = %err, "Could not kill process group");
        }
    }
    let _ = child.kill();
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> Result<(Option<i32>, bool)> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status.code(), false));
        }
        if let Some(limit) = timeout
            && start.elapsed() > limit
        {
            kill_process_tree(child);
            let _ = child.wait();
            return Ok((None, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl ProcessExecutor for ShellExecutor {
    fn execute(&self, command: &str, cwd: &NormalizedPath) -> Result<ProcessOutput> {
        tracing::debug!(%command, cwd = %cwd, "Executing command");

        let mut child = shell_command(command)
            .current_dir(cwd.to_native())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let started = Instant::now();
        let timeout = self.timeout.get();
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (code, timed_out) = wait_with_timeout(&mut child, timeout)?;

        let wait = if timed_out {
            Some(DRAIN_GRACE)
        } else {
            timeout.map(|limit| limit.saturating_sub(started.elapsed()).max(DRAIN_GRACE))
        };
        let stdout = collect(&stdout, wait);
        let stderr = collect(&stderr, wait);

        let exit_code = match (code, timed_out) {
            (_, true) => {
                tracing::warn!(%command, "Command timed out");
                TIMEOUT_EXIT_CODE
            }
            (Some(code), false) => code,
            // terminated by a signal
            (None, false) => 1,
        };

        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
            timed_out,
        })
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout.get()
    }

    fn set_timeout(&self, timeout: Option<Duration>) -> Option<Duration> {
        self.timeout.replace(timeout)
    }
}

/// Kind of asset manager invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Update,
    Version,
    Check,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Update => "update",
            Self::Version => "version",
            Self::Check => "check",
        }
    }

    /// Config key holding the options of this action.
    pub fn options_key(&self) -> String {
        format!("manager-{}-options", self.as_str())
    }
}

/// A fully resolved asset manager command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub binary: String,
    pub action: Action,
    /// Subcommand and built-in flags, e.g. `install --non-interactive`
    pub command: String,
    pub global_options: Option<String>,
    pub action_options: Option<String>,
    pub extra_args: Vec<String>,
}

impl CommandSpec {
    /// Resolve a command from `manager-bin`, `manager-options` and
    /// `manager-<action>-options`.
    pub fn from_config(
        config: &Config,
        default_bin: &str,
        action: Action,
        command: &str,
        extra_args: &[&str],
    ) -> Result<Self> {
        let binary = config
            .get_string("manager-bin")?
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| default_bin.to_string());
        let binary = if cfg!(windows) {
            binary.replace('/', "\\")
        } else {
            binary
        };

        Ok(Self {
            binary,
            action,
            command: command.to_string(),
            global_options: trimmed_option(config.get_string("manager-options")?),
            action_options: trimmed_option(config.get_string(&action.options_key())?),
            extra_args: extra_args.iter().map(|a| a.to_string()).collect(),
        })
    }

    /// `binary command [global] [action] [extra...]`
    pub fn command_line(&self) -> String {
        let mut line = format!("{} {}", self.binary, self.command);
        for part in [&self.global_options, &self.action_options]
            .into_iter()
            .flatten()
        {
            line.push(' ');
            line.push_str(part);
        }
        for arg in &self.extra_args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

fn trimmed_option(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Executes [`CommandSpec`]s in the project directory.
#[derive(Clone)]
pub struct ProcessRunner {
    executor: Rc<dyn ProcessExecutor>,
    cwd: NormalizedPath,
}

impl std::fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

impl ProcessRunner {
    pub fn new(executor: Rc<dyn ProcessExecutor>, cwd: NormalizedPath) -> Self {
        Self { executor, cwd }
    }

    pub fn cwd(&self) -> &NormalizedPath {
        &self.cwd
    }

    /// Run under the executor's ambient timeout.
    pub fn execute(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        self.executor.execute(&spec.command_line(), &self.cwd)
    }

    /// Run with `timeout` in place of the ambient timeout for this call only.
    pub fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> Result<ProcessOutput> {
        let _guard = TimeoutGuard::new(self.executor.as_ref(), timeout);
        let output = self.execute(spec)?;
        if output.timed_out {
            tracing::warn!(
                command = %spec.command_line(),
                "Command exceeded its timeout and was killed"
            );
        }
        Ok(output)
    }
}

/// Convert a `manager-timeout` value to a duration; zero means no timeout.
pub fn timeout_from_secs(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|s| *s > 0).map(Duration::from_secs)
}
