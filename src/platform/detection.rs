use crate::error::ShimError;

use super::PlatformDescriptor;

/// Host-reported platform identifiers, before mapping to vendor names.
#[derive(Debug, Clone, PartialEq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// Detect the current platform
    pub fn detect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Map to the vendor naming scheme, failing closed on anything unknown.
    pub fn resolve(&self) -> Result<PlatformDescriptor, ShimError> {
        PlatformDescriptor::resolve(&self.os, &self.arch)
    }
}
