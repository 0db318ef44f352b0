//! Bounded execution of external analysis tools

use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// Terminal control sequences (CSI, OSC and friends).
static ANSI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[\x1B\x{9B}][\[\]()#;?]*(?:(?:(?:[a-zA-Z\d]*(?:;[a-zA-Z\d]*)*)?\x07)|(?:(?:\d{1,4}(?:;\d{0,4})*)?[\dA-PRZcf-ntqry=><~]))",
    )
    .expect("valid ANSI regex")
});

// Timestamp and level prefixes such as "2024-01-01 10:00:00 [INFO]   ".
static LOG_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*?\]   ").expect("valid log prefix regex"));

/// How long to wait for output pipes after the process is gone
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Bytes kept per output stream; the rest is read and discarded
pub const DEFAULT_OUTPUT_LIMIT: usize = 4 * 1024 * 1024;

/// Outcome of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    /// Exit status 0
    Success,
    /// Nonzero exit; `None` when the process was ended by a signal
    Failed(Option<i32>),
    /// Killed after exceeding its timeout
    TimedOut,
    /// The program could not be started or waited on
    LaunchFailed(String),
}

impl ToolStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Captured output of one tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: ToolStatus,
    /// Stdout or stderr exceeded the output limit and was cut off
    pub truncated: bool,
}

impl ToolOutput {
    /// Stdout followed by stderr with escape sequences and log prefixes removed
    pub fn report(&self) -> String {
        let mut raw = String::from_utf8_lossy(&self.stdout).into_owned();
        raw.push_str(&String::from_utf8_lossy(&self.stderr));
        self.finish_report(raw)
    }

    /// Like [`report`](Self::report) for tools that log their findings to stderr
    pub fn stderr_report(&self) -> String {
        self.finish_report(String::from_utf8_lossy(&self.stderr).into_owned())
    }

    fn finish_report(&self, mut raw: String) -> String {
        if self.truncated {
            raw.push_str("\n[output truncated]\n");
        }
        match &self.status {
            ToolStatus::TimedOut => raw.push_str("\n[tool timed out and was terminated]\n"),
            ToolStatus::LaunchFailed(e) => raw.push_str(&format!("\n[tool could not be launched: {}]\n", e)),
            _ => {}
        }
        sanitize(&raw)
    }
}

/// Strip terminal escape sequences and log-line prefixes
pub fn sanitize(raw: &str) -> String {
    let without_ansi = ANSI_REGEX.replace_all(raw, "");
    LOG_PREFIX_REGEX.replace_all(&without_ansi, "").into_owned()
}

/// One external command run inside a repository checkout
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    work_dir: PathBuf,
    env: Vec<(String, String)>,
    timeout: Duration,
    output_limit: usize,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
            env: Vec::new(),
            timeout,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    /// Cap the bytes captured from each of stdout and stderr
    pub fn output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes;
        self
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable on top of the inherited environment
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run to completion or until the timeout, whichever comes first.
    ///
    /// Never returns while the child is still running: on timeout the tool
    /// and every process it started are killed and the child is reaped before
    /// returning.
    pub async fn run(&self) -> ToolOutput {
        debug!("Running {} in {}", self.program.display(), self.work_dir.display());

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.work_dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The tool leads its own process group so its children can be killed with it.
        #[cfg(unix)]
        command.process_group(0);

        let spawned = command.spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!("Could not launch {}: {}", self.program.display(), e);
                return ToolOutput {
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    status: ToolStatus::LaunchFailed(e.to_string()),
                    truncated: false,
                };
            }
        };

        let pid = child.id();
        let limit = self.output_limit;
        let stdout = child.stdout.take().map(|pipe| tokio::spawn(read_capped(pipe, limit)));
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(read_capped(pipe, limit)));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => ToolStatus::Success,
            Ok(Ok(status)) => ToolStatus::Failed(status.code()),
            Ok(Err(e)) => ToolStatus::LaunchFailed(e.to_string()),
            Err(_) => {
                warn!(
                    "{} exceeded {}s, terminating",
                    self.program.display(),
                    self.timeout.as_secs()
                );
                terminate(&mut child, pid, &self.program).await;
                ToolStatus::TimedOut
            }
        };
        // Background processes left behind by a tool that exited on its own
        kill_process_group(pid);

        debug!("{} finished: {:?}", self.program.display(), status);
        let (stdout, stdout_truncated) = drain(stdout).await;
        let (stderr, stderr_truncated) = drain(stderr).await;
        ToolOutput {
            stdout,
            stderr,
            status,
            truncated: stdout_truncated || stderr_truncated,
        }
    }
}

/// Kill the tool's whole process group, then kill and reap the tool itself
async fn terminate(child: &mut Child, pid: Option<u32>, program: &Path) {
    kill_process_group(pid);
    if let Err(e) = child.kill().await {
        warn!("Failed to kill {}: {}", program.display(), e);
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: killpg only sends a signal. The group was created for this
    // child by `process_group(0)`, so its id is the child's pid.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        let error = std::io::Error::last_os_error();
        // ESRCH: the group is already empty
        if error.raw_os_error() != Some(libc::ESRCH) {
            warn!("Failed to kill process group {}: {}", pgid, error);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Read up to `limit` bytes, then keep draining so the tool never blocks on
/// a full pipe. Returns the kept bytes and whether anything was dropped.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    // Partial output is still useful when the pipe breaks.
    let _ = (&mut reader).take(limit as u64).read_to_end(&mut buf).await;
    let discarded = tokio::io::copy(&mut reader, &mut tokio::io::sink())
        .await
        .unwrap_or(0);
    (buf, discarded > 0)
}

/// Collect a pipe reader; grandchildren holding the pipe open are not waited on
async fn drain(reader: Option<JoinHandle<(Vec<u8>, bool)>>) -> (Vec<u8>, bool) {
    let Some(handle) = reader else {
        return (Vec::new(), false);
    };
    match tokio::time::timeout(PIPE_DRAIN_TIMEOUT, handle).await {
        Ok(Ok(captured)) => captured,
        _ => (Vec::new(), false),
    }
}
