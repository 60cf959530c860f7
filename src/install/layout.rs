use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use crate::archive::ArchiveFormat;
use crate::platform::PlatformDescriptor;
use crate::runtime::Runtime;

const STAGING_DIR: &str = ".showboat-extract";
const RECEIPT_FILE: &str = ".showboat-install.json";
const USER_ROOT_DIR: &str = ".showboat";

/// Name of the showboat executable on the platform this shim was built for.
pub fn host_binary_name() -> &'static str {
    if cfg!(windows) { "showboat.exe" } else { "showboat" }
}

/// Paths below an install root. The binary always lives in `<root>/bin/`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn binary_path(&self, platform: &PlatformDescriptor) -> PathBuf {
        self.bin_dir().join(platform.binary_name())
    }

    pub fn host_binary_path(&self) -> PathBuf {
        self.bin_dir().join(host_binary_name())
    }

    /// Where the downloaded archive is written before extraction.
    pub fn archive_path(&self, format: ArchiveFormat) -> PathBuf {
        self.bin_dir().join(format!("showboat.{}", format.extension()))
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.bin_dir().join(STAGING_DIR)
    }

    pub fn receipt_path(&self) -> PathBuf {
        self.bin_dir().join(RECEIPT_FILE)
    }
}

/// Get the default install root directory
#[tracing::instrument(skip(runtime))]
pub fn default_install_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_install_root())
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(USER_ROOT_DIR))
    }
}

/// Roots searched for an existing install: per-user first, then system-wide.
pub fn search_install_roots<R: Runtime>(runtime: &R) -> Vec<PathBuf> {
    let mut roots = Vec::with_capacity(2);
    if let Some(home_dir) = runtime.home_dir() {
        roots.push(home_dir.join(USER_ROOT_DIR));
    }
    roots.push(system_install_root());
    roots
}

/// The first searched root that holds the host binary. Falls back to the
/// default install root, so a missing binary is reported where `install`
/// would put it.
#[tracing::instrument(skip(runtime))]
pub fn locate_install_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    for root in search_install_roots(runtime) {
        let binary = InstallLayout::new(&root).host_binary_path();
        if is_regular_file(runtime, &binary) {
            debug!("Found installed binary at {:?}", binary);
            return Ok(root);
        }
    }
    default_install_root(runtime)
}

pub(crate) fn is_regular_file<R: Runtime>(runtime: &R, path: &Path) -> bool {
    runtime.exists(path) && !runtime.is_dir(path)
}

/// Install root used when running privileged.
#[cfg(target_os = "macos")]
pub fn system_install_root() -> PathBuf {
    PathBuf::from("/opt/showboat")
}

#[cfg(target_os = "windows")]
pub fn system_install_root() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\showboat")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn system_install_root() -> PathBuf {
    PathBuf::from("/usr/local/showboat")
}
