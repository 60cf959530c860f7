mod tar_gz;
mod zip;

use crate::error::ShimError;
use crate::runtime::Runtime;
use anyhow::Result;
use log::debug;
use std::collections::VecDeque;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Archive formats release artifacts ship in. Chosen once by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }

    /// Unpack every entry of `archive_path` below `extract_to`.
    /// Any failure is reported as [`ShimError::ExtractionFailed`].
    #[tracing::instrument(skip(self, runtime))]
    pub fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        let result = match self {
            ArchiveFormat::TarGz => tar_gz::extract(runtime, archive_path, extract_to),
            ArchiveFormat::Zip => zip::extract(runtime, archive_path, extract_to),
        };
        result.map_err(|e| {
            ShimError::ExtractionFailed {
                archive: archive_path.to_path_buf(),
                reason: format!("{:#}", e),
            }
            .into()
        })
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Breadth-first search for a regular file called `name` below `dir`,
/// so a top-level match wins over one nested in a release directory.
#[tracing::instrument(skip(runtime))]
pub fn find_binary<R: Runtime>(runtime: &R, dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    let mut queue = VecDeque::from([dir.to_path_buf()]);

    while let Some(current) = queue.pop_front() {
        let mut entries = runtime.read_dir(&current)?;
        entries.sort();
        for entry in entries {
            if runtime.is_dir(&entry) {
                queue.push_back(entry);
            } else if entry.file_name().is_some_and(|n| n == name) {
                debug!("Found {} at {:?}", name, entry);
                return Ok(Some(entry));
            }
        }
    }

    Ok(None)
}

/// Rejects entry paths that are absolute or climb out of the target directory.
fn is_confined(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Archive permission bits, keeping the owner able to read and write.
#[cfg_attr(not(unix), allow(dead_code))]
fn normalized_mode(mode: u32) -> Option<u32> {
    let mode = mode & 0o777;
    if mode == 0 { None } else { Some(mode | 0o600) }
}
