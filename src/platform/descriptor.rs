use std::fmt;

use crate::archive::ArchiveFormat;
use crate::error::{PlatformPart, ShimError};

/// Operating system names used in release artifact file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsName {
    Darwin,
    Linux,
    Windows,
}

impl OsName {
    /// Accepts both Rust (`macos`) and Node-style (`darwin`, `win32`) identifiers.
    pub fn from_host(os: &str) -> Result<Self, ShimError> {
        match os {
            "darwin" | "macos" => Ok(OsName::Darwin),
            "linux" => Ok(OsName::Linux),
            "windows" | "win32" => Ok(OsName::Windows),
            other => Err(ShimError::UnsupportedPlatform {
                kind: PlatformPart::OperatingSystem,
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsName::Darwin => "darwin",
            OsName::Linux => "linux",
            OsName::Windows => "windows",
        }
    }
}

impl fmt::Display for OsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture names used in release artifact file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchName {
    Amd64,
    Arm64,
}

impl ArchName {
    /// Accepts both Rust (`x86_64`, `aarch64`) and Node-style (`x64`, `arm64`) identifiers.
    pub fn from_host(arch: &str) -> Result<Self, ShimError> {
        match arch {
            "x64" | "x86_64" => Ok(ArchName::Amd64),
            "arm64" | "aarch64" => Ok(ArchName::Arm64),
            other => Err(ShimError::UnsupportedPlatform {
                kind: PlatformPart::Architecture,
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchName::Amd64 => "amd64",
            ArchName::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for ArchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor-side view of the host: which artifact to fetch and how to unpack it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformDescriptor {
    pub os: OsName,
    pub arch: ArchName,
    pub archive: ArchiveFormat,
}

impl PlatformDescriptor {
    #[tracing::instrument]
    pub fn resolve(os: &str, arch: &str) -> Result<Self, ShimError> {
        let os = OsName::from_host(os)?;
        let arch = ArchName::from_host(arch)?;
        let archive = match os {
            OsName::Windows => ArchiveFormat::Zip,
            OsName::Darwin | OsName::Linux => ArchiveFormat::TarGz,
        };
        Ok(Self { os, arch, archive })
    }

    /// `showboat-<os>-<arch>.<ext>`
    pub fn asset_name(&self) -> String {
        format!(
            "showboat-{}-{}.{}",
            self.os,
            self.arch,
            self.archive.extension()
        )
    }

    pub fn binary_name(&self) -> &'static str {
        match self.os {
            OsName::Windows => "showboat.exe",
            OsName::Darwin | OsName::Linux => "showboat",
        }
    }

    /// Whether the extracted binary needs an explicit execute bit.
    pub fn needs_exec_permission(&self) -> bool {
        self.os != OsName::Windows
    }
}
