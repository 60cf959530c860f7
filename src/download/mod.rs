use crate::http::HttpClient;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;

/// Downloads a URL to `temp_path`. A partially written file is removed
/// before the error is returned; failing to remove it is only logged.
#[tracing::instrument(skip(runtime, temp_path, http_client))]
pub async fn download_file<R: Runtime>(
    runtime: &R,
    url: &str,
    temp_path: &Path,
    http_client: &HttpClient,
) -> Result<u64> {
    info!("Downloading file from {}...", url);

    let result = http_client
        .download_file(url, || {
            runtime
                .create_file(temp_path)
                .with_context(|| format!("Failed to create temporary file at {:?}", temp_path))
        })
        .await;

    match result {
        Ok(bytes) => {
            info!("Download complete.");
            Ok(bytes)
        }
        Err(e) => {
            if runtime.exists(temp_path)
                && let Err(cleanup_err) = runtime.remove_file(temp_path)
            {
                warn!(
                    "Failed to clean up partial download {:?}: {}",
                    temp_path, cleanup_err
                );
            }
            Err(e)
        }
    }
}
