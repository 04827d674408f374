//! External tool invocation.
//!
//! Every call out to `aapt` or `adb` goes through [`ToolCommand`], which
//! captures both output streams and optionally enforces a deadline.

use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Failure to run an external tool to completion.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The executable could not be located.
    #[error("{tool} not found in PATH; install the Android SDK build-tools or set {env}")]
    NotFound {
        /// Executable name(s) searched for.
        tool: String,
        /// Environment variable that overrides discovery.
        env: &'static str,
    },

    /// The process could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// Command line.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    Failed {
        /// Command line.
        command: String,
        /// Exit status.
        status: ExitStatus,
        /// Captured diagnostic output.
        stderr: String,
    },

    /// The process outlived its deadline and was killed.
    #[error("`{command}` timed out after {}s", .timeout.as_secs_f64())]
    Timeout {
        /// Command line.
        command: String,
        /// Deadline that expired.
        timeout: Duration,
    },
}

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit status.
    pub status: ExitStatus,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

impl ToolOutput {
    /// Both streams, trimmed and joined; what a human needs to see on failure.
    pub fn diagnostic(&self) -> String {
        let out = self.stdout.trim();
        let err = self.stderr.trim();
        match (out.is_empty(), err.is_empty()) {
            (true, _) => err.to_string(),
            (false, true) => out.to_string(),
            (false, false) => format!("{out}\n{err}"),
        }
    }
}

/// A command line for an external tool.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// Start a command for `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Kill the process if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program being run.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Human-readable command line for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| {
                let part = part.to_string_lossy();
                if part.contains(' ') {
                    format!("'{part}'")
                } else {
                    part.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion and capture output regardless of exit status.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Spawn`] if the process cannot be started and
    /// [`ToolError::Timeout`] if it outlives its deadline.
    pub fn output(&self) -> Result<ToolOutput, ToolError> {
        let command = self.display();
        debug!(%command, "running");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let spawn_error = |source| ToolError::Spawn {
            command: command.clone(),
            source,
        };

        let Some(timeout) = self.timeout else {
            let out = cmd.output().map_err(spawn_error)?;
            return Ok(ToolOutput {
                status: out.status,
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        };

        let mut child = cmd.spawn().map_err(spawn_error)?;
        // Drain both pipes concurrently so a chatty child cannot block on a full pipe
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        match child.wait_timeout(timeout).map_err(spawn_error)? {
            Some(status) => Ok(ToolOutput {
                status,
                stdout: collect(stdout),
                stderr: collect(stderr),
            }),
            None => {
                warn!(%command, ?timeout, "killing tool after deadline");
                if let Err(e) = child.kill() {
                    debug!(error = %e, "kill failed, child already exited");
                }
                // Reap; reader threads finish once the pipes close
                let _ = child.wait();
                Err(ToolError::Timeout { command, timeout })
            }
        }
    }

    /// Run to completion and return stdout, failing on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Everything [`output`](Self::output) returns, plus
    /// [`ToolError::Failed`] carrying the tool's diagnostic text.
    pub fn run(&self) -> Result<String, ToolError> {
        let output = self.output()?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(ToolError::Failed {
                command: self.display(),
                status: output.status,
                stderr: output.diagnostic(),
            })
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_run_captures_stdout() {
        let out = sh("echo hello").run().unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[test]
    fn test_run_reports_failure() {
        let err = sh("echo oops >&2; exit 3").run().unwrap_err();
        match err {
            ToolError::Failed { stderr, status, .. } => {
                assert_eq!(stderr, "oops");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_output_with_generous_timeout() {
        let out = sh("echo fast; echo slow >&2")
            .timeout(Some(Duration::from_secs(30)))
            .output()
            .unwrap();
        assert!(out.status.success());
        assert_eq!(out.diagnostic(), "fast\nslow");
    }

    #[test]
    fn test_timeout_kills_child() {
        let err = ToolCommand::new("sleep")
            .arg("10")
            .timeout(Some(Duration::from_millis(100)))
            .output()
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[test]
    fn test_missing_program() {
        let err = ToolCommand::new("/nonexistent/apkit-tool").run().unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[test]
    fn test_display_quotes_spaces() {
        let cmd = ToolCommand::new("aapt").args(["dump", "badging", "/tmp/my app.apk"]);
        assert_eq!(cmd.display(), "aapt dump badging '/tmp/my app.apk'");
    }
}
