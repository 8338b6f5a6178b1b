//! External tool execution.
//!
//! Every collaborator the pipeline drives (converter, defacer, manifest
//! generator, validator, tree lister) is an opaque subprocess. This
//! module holds the configured invocation (`ToolSpec`), runs it with
//! captured output, and enforces an optional per-invocation timeout.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Poll interval while waiting on a child process.
const WAIT_POLL: Duration = Duration::from_millis(25);

/// Configured invocation of an external tool.
///
/// The pipeline appends the per-run path argument (session root, target
/// directory, or manifest record) after `args`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Program name or path, resolved through `PATH` if relative.
    pub program: String,
    /// Fixed leading arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Kill the invocation after this many milliseconds (None = no limit).
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ToolSpec {
    /// Create a spec with no fixed arguments and no timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_ms: None,
        }
    }

    /// Set the fixed leading arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-invocation timeout in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Render the full command line for logging.
    pub fn command_line(&self, extra: &[PathBuf]) -> String {
        let mut parts = Vec::with_capacity(1 + self.args.len() + extra.len());
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.extend(extra.iter().map(|p| p.display().to_string()));
        parts.join(" ")
    }
}

/// Captured result of one tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    /// Process exit code (-1 if killed or unavailable).
    pub exit_code: i32,
    /// Captured stdout bytes.
    pub stdout: Vec<u8>,
    /// Captured stderr bytes.
    pub stderr: Vec<u8>,
    /// Whether the invocation was killed on timeout.
    pub timed_out: bool,
}

impl ToolOutput {
    /// Whether the tool exited cleanly.
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Lossy stdout text.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Lossy stderr text.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Stdout followed by stderr, for log artifacts.
    pub fn combined(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.stdout.len() + self.stderr.len());
        out.extend_from_slice(&self.stdout);
        out.extend_from_slice(&self.stderr);
        out
    }
}

/// Run a tool to completion, capturing stdout and stderr.
///
/// `extra` is appended after the spec's fixed arguments. Stdout and
/// stderr are drained by reader threads so a chatty tool cannot
/// deadlock on a full pipe. When the spec carries a timeout and the
/// deadline passes, the child is killed and `timed_out` is set; the
/// partial output captured up to that point is still returned.
pub fn run_tool(spec: &ToolSpec, extra: &[PathBuf]) -> io::Result<ToolOutput> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args);
    for arg in extra {
        cmd.arg(arg);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!(program = %spec.program, "spawning external tool");

    let mut child = cmd.spawn()?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("failed to capture child stdout"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("failed to capture child stderr"))?;

    let stdout_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });
    let stderr_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        buf
    });

    let deadline = spec
        .timeout_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    let mut timed_out = false;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                timed_out = true;
                let _ = child.kill();
                break child.wait()?;
            }
        }
        thread::sleep(WAIT_POLL);
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    let exit_code = status.code().unwrap_or(-1);
    tracing::debug!(program = %spec.program, exit_code, timed_out, "tool finished");

    Ok(ToolOutput {
        exit_code,
        stdout,
        stderr,
        timed_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolSpec {
        ToolSpec::new("/bin/sh").with_args(["-c", script, "sh"])
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let out = run_tool(&sh("echo hello"), &[]).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout_text().trim(), "hello");
    }

    #[test]
    fn reports_nonzero_exit() {
        let out = run_tool(&sh("echo oops >&2; exit 3"), &[]).unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stderr_text().trim(), "oops");
    }

    #[test]
    fn passes_extra_path_argument() {
        let out = run_tool(&sh("echo got $1"), &[PathBuf::from("/data/root")]).unwrap();
        assert_eq!(out.stdout_text().trim(), "got /data/root");
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let spec = ToolSpec::new("/nonexistent/definitely-not-a-tool");
        assert!(run_tool(&spec, &[]).is_err());
    }

    #[test]
    fn kills_on_timeout() {
        let spec = sh("sleep 30").with_timeout_ms(100);
        let out = run_tool(&spec, &[]).unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
    }

    #[test]
    fn command_line_renders_program_args_and_extras() {
        let spec = ToolSpec::new("bids-validator").with_args(["--json"]);
        let line = spec.command_line(&[PathBuf::from("/data/bids")]);
        assert_eq!(line, "bids-validator --json /data/bids");
    }
}
