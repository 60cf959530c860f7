use anyhow::Result;
use log::{debug, info};
use std::path::PathBuf;

use crate::install::layout::{InstallLayout, default_install_root, locate_install_root};
use crate::platform::PlatformDescriptor;
use crate::runtime::Runtime;

/// Where showboat releases are published.
pub const DEFAULT_BASE_URL: &str = "https://github.com/simonw/showboat/releases/download";

/// The showboat release this shim installs, fixed at build time.
pub const PINNED_VERSION: &str = env!("SHOWBOAT_PINNED_VERSION");

/// Everything the installer needs to know that is not derived from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ShimConfig {
    pub base_url: String,
    pub version: String,
    pub install_root: Option<PathBuf>,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            version: PINNED_VERSION.to_string(),
            install_root: None,
        }
    }
}

impl ShimConfig {
    pub fn new(
        install_root: Option<PathBuf>,
        base_url: Option<String>,
        version: Option<String>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            base_url: base_url.unwrap_or(defaults.base_url),
            version: version
                .map(|v| v.trim_start_matches('v').to_string())
                .unwrap_or(defaults.version),
            install_root,
        }
    }

    /// `<base>/v<version>/showboat-<os>-<arch>.<ext>`
    pub fn download_url(&self, platform: &PlatformDescriptor) -> String {
        format!(
            "{}/v{}/{}",
            self.base_url.trim_end_matches('/'),
            self.version,
            platform.asset_name()
        )
    }

    /// Resolves the install root, falling back to the per-user or system default.
    #[tracing::instrument(skip(self, runtime))]
    pub fn layout<R: Runtime>(&self, runtime: &R) -> Result<InstallLayout> {
        let root = match &self.install_root {
            Some(path) => path.clone(),
            None => default_install_root(runtime)?,
        };

        info!("Using install root: {}", root.display());
        Ok(InstallLayout::new(root))
    }

    /// Layout a launcher reads from. Without an explicit root this is
    /// wherever an install already exists, whoever installed it.
    #[tracing::instrument(skip(self, runtime))]
    pub fn launch_layout<R: Runtime>(&self, runtime: &R) -> Result<InstallLayout> {
        let root = match &self.install_root {
            Some(path) => path.clone(),
            None => locate_install_root(runtime)?,
        };

        debug!("Launching from install root: {}", root.display());
        Ok(InstallLayout::new(root))
    }
}
