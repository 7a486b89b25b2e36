//! Subprocess execution.
//!
//! Every external tool (`reg`, `vswhere`, deploy tools, `tasklist`,
//! PowerShell) is invoked through the [`CommandRunner`] trait so detection
//! logic can be exercised against scripted output.

use crate::{DetectError, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        out.push_str(&self.stderr);
        out
    }

    /// Converts a non-zero exit into [`DetectError::ToolFailed`].
    pub fn into_success(self, program: &OsStr) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        let message = first_line(&self.stderr)
            .or_else(|| first_line(&self.stdout))
            .unwrap_or_else(|| format!("exited with code {:?}", self.code));
        Err(DetectError::ToolFailed {
            program: program.to_string_lossy().into_owned(),
            exit_code: self.code,
            message,
        })
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(String::from)
}

/// Runs external programs.
///
/// A non-zero exit is *not* an error at this level: implementations return
/// `Ok` with the exit code so callers decide whether it is fatal. Errors are
/// reserved for failing to spawn the process and for timeouts.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args`, killing it if it outlives `limit`.
    async fn run(&self, program: &OsStr, args: &[String], limit: Duration) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &OsStr,
        args: &[String],
        limit: Duration,
    ) -> Result<CommandOutput> {
        let mut command = Command::new(program);
        command
            .args(args)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(program = %program.to_string_lossy(), ?args, "running");

        let output = match timeout(limit, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(DetectError::PermissionDenied {
                    message: format!("{}: {}", program.to_string_lossy(), e),
                });
            }
            Ok(Err(e)) => return Err(DetectError::Io(e)),
            Err(_) => {
                return Err(DetectError::Timeout {
                    operation: program.to_string_lossy().into_owned(),
                    duration: limit,
                });
            }
        };

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted runner shared by unit tests.

    use super::*;
    use parking_lot::Mutex;

    type Responder = Box<dyn Fn(&str, &[String]) -> Option<Result<CommandOutput>> + Send + Sync>;

    /// Answers invocations from a list of responders; the first responder
    /// returning `Some` wins. Unanswered invocations fail with exit code 1.
    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        responders: Vec<Responder>,
        pub(crate) calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond<F>(mut self, f: F) -> Self
        where
            F: Fn(&str, &[String]) -> Option<Result<CommandOutput>> + Send + Sync + 'static,
        {
            self.responders.push(Box::new(f));
            self
        }

        /// Responds with `stdout` whenever `program` is run with exactly `args`.
        pub(crate) fn on(self, program: &str, args: &[&str], stdout: &str) -> Self {
            let program = program.to_string();
            let expected: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            let stdout = stdout.to_string();
            self.respond(move |p, a| {
                (p == program && a == expected.as_slice())
                    .then(|| Ok(CommandOutput::ok(stdout.clone())))
            })
        }

        pub(crate) fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
            self.calls
                .lock()
                .iter()
                .filter(|(p, _)| p == program)
                .map(|(_, args)| args.clone())
                .collect()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            program: &OsStr,
            args: &[String],
            _limit: Duration,
        ) -> Result<CommandOutput> {
            let program = program.to_string_lossy().into_owned();
            self.calls.lock().push((program.clone(), args.to_vec()));
            for responder in &self.responders {
                if let Some(result) = responder(&program, args) {
                    return result;
                }
            }
            Ok(CommandOutput::failed(
                1,
                "ERROR: The system was unable to find the specified registry key or value.",
            ))
        }
    }
}
