//! Scripted [`ProcessExecutor`] for tests.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use foxy_core::process::{DEFAULT_TIMEOUT, ProcessExecutor, ProcessOutput};
use foxy_core::{Error, Result};
use foxy_fs::NormalizedPath;

/// One recorded execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub command: String,
    pub cwd: NormalizedPath,
    /// Timeout in effect while the command ran
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
enum Reply {
    Output(ProcessOutput),
    SpawnError(String),
}

#[derive(Debug)]
struct Response {
    prefix: String,
    once: bool,
    used: bool,
    reply: Reply,
}

/// Answers commands from a script and records every call.
///
/// Responses match on command prefix. One-shot responses are consumed in
/// registration order before persistent ones are considered. Unmatched
/// commands succeed with empty output.
///
/// ```rust
/// use foxy_test_utils::MockExecutor;
///
/// let executor = MockExecutor::new();
/// executor.respond("yarn --version", 0, "1.22.19\n");
/// executor.respond_once("yarn install", 1, "");
/// ```
#[derive(Debug)]
pub struct MockExecutor {
    responses: RefCell<Vec<Response>>,
    calls: RefCell<Vec<Call>>,
    timeout: Cell<Option<Duration>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            responses: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            timeout: Cell::new(Some(DEFAULT_TIMEOUT)),
        }
    }

    /// Answer every command starting with `prefix`.
    pub fn respond(&self, prefix: &str, exit_code: i32, stdout: &str) -> &Self {
        self.push(prefix, false, Reply::Output(output(exit_code, stdout)))
    }

    /// Answer the next command starting with `prefix`, once.
    pub fn respond_once(&self, prefix: &str, exit_code: i32, stdout: &str) -> &Self {
        self.push(prefix, true, Reply::Output(output(exit_code, stdout)))
    }

    /// Answer with a full [`ProcessOutput`], e.g. a timeout.
    pub fn respond_with(&self, prefix: &str, reply: ProcessOutput) -> &Self {
        self.push(prefix, false, Reply::Output(reply))
    }

    /// Fail to start commands starting with `prefix`.
    pub fn fail_to_spawn(&self, prefix: &str, message: &str) -> &Self {
        self.push(prefix, false, Reply::SpawnError(message.to_string()))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.command.clone()).collect()
    }

    /// Whether any recorded command starts with `prefix`.
    pub fn ran(&self, prefix: &str) -> bool {
        self.calls
            .borrow()
            .iter()
            .any(|c| c.command.starts_with(prefix))
    }

    fn push(&self, prefix: &str, once: bool, reply: Reply) -> &Self {
        self.responses.borrow_mut().push(Response {
            prefix: prefix.to_string(),
            once,
            used: false,
            reply,
        });
        self
    }

    fn reply_for(&self, command: &str) -> Option<Reply> {
        let mut responses = self.responses.borrow_mut();
        if let Some(response) = responses
            .iter_mut()
            .find(|r| r.once && !r.used && command.starts_with(&r.prefix))
        {
            response.used = true;
            return Some(response.reply.clone());
        }
        responses
            .iter()
            .find(|r| !r.once && command.starts_with(&r.prefix))
            .map(|r| r.reply.clone())
    }
}

fn output(exit_code: i32, stdout: &str) -> ProcessOutput {
    ProcessOutput {
        exit_code,
        stdout: stdout.to_string(),
        ..Default::default()
    }
}

impl ProcessExecutor for MockExecutor {
    fn execute(&self, command: &str, cwd: &NormalizedPath) -> Result<ProcessOutput> {
        self.calls.borrow_mut().push(Call {
            command: command.to_string(),
            cwd: cwd.clone(),
            timeout: self.timeout.get(),
        });

        match self.reply_for(command) {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::SpawnError(message)) => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                message,
            ))),
            None => Ok(ProcessOutput::default()),
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout.get()
    }

    fn set_timeout(&self, timeout: Option<Duration>) -> Option<Duration> {
        self.timeout.replace(timeout)
    }
}
