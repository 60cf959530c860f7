//! Error taxonomy shared by the installer and the launcher.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::launcher::RunOutput;

/// Exit code used when the installed binary exists but could not be started.
pub const EXIT_SPAWN_FAILED: i32 = 126;

/// Exit code used for every other local failure (including "not installed").
pub const EXIT_LOCAL_FAILURE: i32 = 1;

#[derive(Debug, Error)]
pub enum ShimError {
    #[error("Unsupported {kind}: {value}")]
    UnsupportedPlatform { kind: PlatformPart, value: String },

    #[error("Failed to download {url}: {status_code} {status_message}")]
    DownloadFailed {
        url: String,
        status_code: u16,
        status_message: String,
    },

    #[error("Failed to download {url}: more than {limit} redirects")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Failed to download {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to extract {}: {reason}", archive.display())]
    ExtractionFailed { archive: PathBuf, reason: String },

    #[error(
        "showboat binary not found at {}. Please run: showboat-shim install",
        path.display()
    )]
    BinaryNotInstalled { path: PathBuf },

    #[error("Failed to start {}: {source}", path.display())]
    SpawnFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("showboat exited with {}", describe_code(*code))]
    ChildExitedNonZero { code: Option<i32>, output: RunOutput },

    #[error("showboat timed out after {after:?}")]
    TimedOut { after: Duration, output: RunOutput },
}

/// Which half of the host triple was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformPart {
    OperatingSystem,
    Architecture,
}

impl std::fmt::Display for PlatformPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformPart::OperatingSystem => write!(f, "platform"),
            PlatformPart::Architecture => write!(f, "architecture"),
        }
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl ShimError {
    /// Output captured from the child, for failures that ran it.
    pub fn captured_output(&self) -> Option<&RunOutput> {
        match self {
            ShimError::ChildExitedNonZero { output, .. } | ShimError::TimedOut { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }

    /// Process exit code a CLI should report for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShimError::SpawnFailed { .. } => EXIT_SPAWN_FAILED,
            ShimError::ChildExitedNonZero {
                code: Some(code), ..
            } => *code,
            _ => EXIT_LOCAL_FAILURE,
        }
    }
}

/// Finds a [`ShimError`] anywhere in an `anyhow` chain.
pub fn find_shim_error(err: &anyhow::Error) -> Option<&ShimError> {
    err.chain().find_map(|cause| cause.downcast_ref::<ShimError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_not_installed_message_mentions_install() {
        let err = ShimError::BinaryNotInstalled {
            path: PathBuf::from("/tmp/bin/showboat"),
        };
        let msg = err.to_string();
        assert!(msg.contains("install"));
        assert!(msg.contains("/tmp/bin/showboat"));
        assert_eq!(err.exit_code(), EXIT_LOCAL_FAILURE);
    }

    #[test]
    fn test_spawn_failed_exit_code_is_distinct() {
        let err = ShimError::SpawnFailed {
            path: PathBuf::from("showboat"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.exit_code(), EXIT_SPAWN_FAILED);
        assert_ne!(err.exit_code(), EXIT_LOCAL_FAILURE);
    }

    #[test]
    fn test_unsupported_platform_names_value() {
        let err = ShimError::UnsupportedPlatform {
            kind: PlatformPart::Architecture,
            value: "riscv64".into(),
        };
        assert_eq!(err.to_string(), "Unsupported architecture: riscv64");
    }

    #[test]
    fn test_captured_output_only_for_child_failures() {
        let output = RunOutput {
            stdout: "partial".into(),
            stderr: "boom".into(),
        };
        let err = ShimError::ChildExitedNonZero {
            code: Some(3),
            output: output.clone(),
        };
        assert_eq!(err.captured_output(), Some(&output));
        assert_eq!(err.exit_code(), 3);

        let err = ShimError::BinaryNotInstalled {
            path: PathBuf::from("x"),
        };
        assert!(err.captured_output().is_none());
    }

    #[test]
    fn test_find_shim_error_through_context() {
        let err = anyhow::Error::from(ShimError::DownloadFailed {
            url: "http://example.com".into(),
            status_code: 404,
            status_message: "Not Found".into(),
        });
        let err = Err::<(), _>(err).context("Installation failed").unwrap_err();

        match find_shim_error(&err) {
            Some(ShimError::DownloadFailed { status_code, .. }) => assert_eq!(*status_code, 404),
            other => panic!("Expected DownloadFailed, got {:?}", other),
        }
    }
}
