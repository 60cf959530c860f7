use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::platform::PlatformDescriptor;
use crate::runtime::Runtime;

/// Record of the last successful install, stored next to the binary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InstallReceipt {
    pub version: String,
    pub url: String,
    pub os: String,
    pub arch: String,
    pub installed_at_unix: u64,
}

impl InstallReceipt {
    pub fn new(version: &str, url: &str, platform: &PlatformDescriptor) -> Self {
        let installed_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            version: version.to_string(),
            url: url.to_string(),
            os: platform.os.to_string(),
            arch: platform.arch.to_string(),
            installed_at_unix,
        }
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read install receipt {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse install receipt {:?}", path))
    }

    /// Loads the receipt, treating a missing or unreadable file as "no receipt".
    pub fn load_optional<R: Runtime>(runtime: &R, path: &Path) -> Option<Self> {
        if !runtime.exists(path) {
            return None;
        }
        match Self::load(runtime, path) {
            Ok(receipt) => Some(receipt),
            Err(e) => {
                debug!("Ignoring install receipt: {:#}", e);
                None
            }
        }
    }

    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize receipt")?;
        runtime
            .write(path, json.as_bytes())
            .with_context(|| format!("Failed to write install receipt {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use tempfile::tempdir;

    fn linux() -> PlatformDescriptor {
        PlatformDescriptor::resolve("linux", "x64").unwrap()
    }

    #[test]
    fn test_receipt_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".showboat-install.json");
        let receipt = InstallReceipt::new("0.4.0", "http://example.com/a.tar.gz", &linux());

        receipt.save(&RealRuntime, &path).unwrap();
        let loaded = InstallReceipt::load(&RealRuntime, &path).unwrap();

        assert_eq!(loaded, receipt);
        assert_eq!(loaded.os, "linux");
        assert_eq!(loaded.arch, "amd64");
        assert!(loaded.installed_at_unix > 0);
    }

    #[test]
    fn test_load_optional_missing() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);

        assert!(InstallReceipt::load_optional(&runtime, Path::new("/r.json")).is_none());
    }

    #[test]
    fn test_load_optional_corrupt() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("{ not json".to_string()));

        assert!(InstallReceipt::load_optional(&runtime, Path::new("/r.json")).is_none());
    }

    #[test]
    fn test_load_reports_parse_error() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok(r#"{"version": 4}"#.to_string()));

        let err = InstallReceipt::load(&runtime, Path::new("/r.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse install receipt"));
    }
}
