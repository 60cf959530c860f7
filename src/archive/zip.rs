use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Extracts every entry of a `.zip` archive through the runtime.
pub(super) fn extract<R: Runtime>(runtime: &R, archive_path: &Path, extract_to: &Path) -> Result<()> {
    debug!("Extracting zip archive to {:?}...", extract_to);
    let file = runtime
        .open(archive_path)
        .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

    // zip crate requires Read + Seek, but Runtime::open returns Box<dyn Read + Send>
    let mut buffer = Vec::new();
    let mut reader = file;
    reader
        .read_to_end(&mut buffer)
        .with_context(|| format!("Failed to read archive {:?}", archive_path))?;

    let mut archive = ZipArchive::new(std::io::Cursor::new(buffer))
        .with_context(|| "Failed to parse ZIP archive")?;

    let mut files = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read ZIP entry {}", i))?;

        let entry_path = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                debug!("Skipping entry with invalid path: {}", entry.name());
                continue;
            }
        };

        let full_path = extract_to.join(&entry_path);

        if entry.is_dir() {
            runtime.create_dir_all(&full_path)?;
            continue;
        }

        if let Some(parent) = full_path.parent() {
            runtime.create_dir_all(parent)?;
        }
        let mut dest_file = runtime.create_file(&full_path)?;
        std::io::copy(&mut entry, &mut dest_file)
            .with_context(|| format!("Failed to extract file {:?}", full_path))?;
        drop(dest_file);
        files += 1;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode().and_then(super::normalized_mode)
            && let Err(e) = runtime.set_permissions(&full_path, mode)
        {
            debug!("Failed to set permissions on {:?}: {}", full_path, e);
        }
    }

    if files == 0 {
        return Err(anyhow!("Archive appears to be empty."));
    }

    info!("Extraction complete.");
    Ok(())
}
