//! Runs the installed showboat binary.
//!
//! Two modes are offered:
//!
//! - [`Launcher::passthrough`] inherits the parent's stdio and reports the
//!   child's exit code, for use as a drop-in command.
//! - [`Launcher::run`] captures stdout/stderr and returns them, attaching
//!   them to the error as well when the child fails.
//!
//! Both check that the binary exists before spawning anything.

mod capture;

use anyhow::Result;
use log::debug;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;

use crate::error::{EXIT_LOCAL_FAILURE, ShimError};
use crate::install::{InstallLayout, ShimConfig, is_regular_file};
use crate::runtime::{RealRuntime, Runtime};

use capture::Capture;

/// Minimum time to keep reading output once the child is gone, when a
/// timeout is set.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Captured output of a library-mode run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Spawn settings passed straight through to the child process.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub timeout: Option<Duration>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(OsString, OsString)>,
    pub env_clear: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self
    }

    fn apply(&self, cmd: &mut Command) {
        if self.env_clear {
            cmd.env_clear();
        }
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
    }
}

/// Runs the showboat binary at a fixed path. Existence checks go through `R`.
#[derive(Debug)]
pub struct Launcher<R: Runtime = RealRuntime> {
    runtime: R,
    binary_path: PathBuf,
}

impl<R: Runtime> Launcher<R> {
    pub fn new(runtime: R, binary_path: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            binary_path: binary_path.into(),
        }
    }

    /// Launcher for the host binary inside an install root.
    pub fn from_layout(runtime: R, layout: &InstallLayout) -> Self {
        Self::new(runtime, layout.host_binary_path())
    }

    /// Uses the configured root, or searches the per-user and system roots
    /// for an existing install.
    pub fn from_config(runtime: R, config: &ShimConfig) -> Result<Self> {
        let layout = config.launch_layout(&runtime)?;
        Ok(Self::from_layout(runtime, &layout))
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub fn is_installed(&self) -> bool {
        is_regular_file(&self.runtime, &self.binary_path)
    }

    fn ensure_installed(&self) -> Result<(), ShimError> {
        if self.is_installed() {
            Ok(())
        } else {
            Err(ShimError::BinaryNotInstalled {
                path: self.binary_path.clone(),
            })
        }
    }

    fn spawn_failed(&self, source: std::io::Error) -> ShimError {
        ShimError::SpawnFailed {
            path: self.binary_path.clone(),
            source,
        }
    }

    /// Runs the binary with inherited stdio and returns the exit code it
    /// should be reported with.
    #[tracing::instrument(skip(self, args))]
    pub async fn passthrough<I, S>(&self, args: I) -> Result<i32, ShimError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.ensure_installed()?;

        let status = Command::new(&self.binary_path)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| self.spawn_failed(e))?;

        debug!("showboat exited with {:?}", status);
        Ok(exit_code(status))
    }

    /// Runs the binary and captures its output.
    ///
    /// A non-zero exit or an elapsed timeout yields an error that still
    /// carries the captured output, see [`ShimError::captured_output`].
    #[tracing::instrument(skip(self, args))]
    pub async fn run<I, S>(&self, args: I, options: &RunOptions) -> Result<RunOutput, ShimError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.ensure_installed()?;

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        options.apply(&mut cmd);

        let mut child = cmd.spawn().map_err(|e| self.spawn_failed(e))?;
        let deadline = options.timeout.map(|after| Instant::now() + after);
        let capture = Capture::start(&mut child);

        let status = match options.timeout {
            Some(after) => match tokio::time::timeout(after, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    debug!("showboat timed out after {:?}, killing", after);
                    if let Err(e) = child.kill().await {
                        debug!("Failed to kill timed out child: {}", e);
                    }
                    let output = capture.finish(Some(KILL_GRACE)).await;
                    return Err(ShimError::TimedOut { after, output });
                }
            },
            None => child.wait().await,
        }
        .map_err(|e| self.spawn_failed(e))?;

        // A background process may still hold the pipes after the child exits.
        let grace = deadline.map(|d| d.saturating_duration_since(Instant::now()).max(KILL_GRACE));
        let output = capture.finish(grace).await;
        if status.success() {
            Ok(output)
        } else {
            Err(ShimError::ChildExitedNonZero {
                code: status.code(),
                output,
            })
        }
    }
}

/// Child exit status as a process exit code. Signals map to 128+N on Unix.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    EXIT_LOCAL_FAILURE
}
