use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::Path;
use tar::Archive;

use super::is_confined;

/// Extracts a `.tar.gz` archive entry by entry through the runtime.
pub(super) fn extract<R: Runtime>(runtime: &R, archive_path: &Path, extract_to: &Path) -> Result<()> {
    debug!("Extracting tar.gz archive to {:?}...", extract_to);
    let file = runtime
        .open(archive_path)
        .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

    let mut archive = Archive::new(GzDecoder::new(file));
    let mut files = 0usize;

    for entry in archive
        .entries()
        .context("Failed to read tar entries")?
    {
        let mut entry = entry.context("Failed to read tar entry")?;
        let entry_path = entry
            .path()
            .context("Failed to read tar entry path")?
            .into_owned();

        if !is_confined(&entry_path) {
            debug!("Skipping entry outside of target: {:?}", entry_path);
            continue;
        }

        let full_path = extract_to.join(&entry_path);
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            runtime.create_dir_all(&full_path)?;
        } else if entry_type.is_file() {
            if let Some(parent) = full_path.parent() {
                runtime.create_dir_all(parent)?;
            }
            let mut dest_file = runtime.create_file(&full_path)?;
            std::io::copy(&mut entry, &mut dest_file)
                .with_context(|| format!("Failed to extract file {:?}", full_path))?;
            drop(dest_file);
            files += 1;

            #[cfg(unix)]
            if let Some(mode) = entry.header().mode().ok().and_then(super::normalized_mode)
                && let Err(e) = runtime.set_permissions(&full_path, mode)
            {
                debug!("Failed to set permissions on {:?}: {}", full_path, e);
            }
        } else {
            debug!("Skipping {:?} entry {:?}", entry_type, entry_path);
        }
    }

    if files == 0 {
        return Err(anyhow!("Archive appears to be empty."));
    }

    info!("Extraction complete.");
    Ok(())
}
