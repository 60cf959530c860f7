//! HTTP client that follows redirects itself so the hop count stays bounded.

use anyhow::{Context, Result};
use log::debug;
use reqwest::header::LOCATION;
use reqwest::{Client, Response, StatusCode, Url, redirect};
use std::io::Write;

use crate::error::ShimError;

/// Maximum number of redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 5;

pub const USER_AGENT: &str = "showboat-shim";

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Wraps an existing client. The client should have redirects disabled,
    /// otherwise reqwest follows them before the hop limit applies.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client with automatic redirects turned off.
    pub fn build() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client))
    }

    /// Issues a GET and follows up to [`MAX_REDIRECTS`] redirects.
    /// Only a terminal `200 OK` is accepted.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, url: &str) -> Result<Response> {
        let mut current =
            Url::parse(url).with_context(|| format!("Invalid download URL: {}", url))?;
        let mut redirects = 0;

        loop {
            debug!("GET {}", current);
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|source| ShimError::Transport {
                    url: current.to_string(),
                    source,
                })?;

            let status = response.status();
            if is_redirect(status) {
                if redirects == MAX_REDIRECTS {
                    return Err(ShimError::TooManyRedirects {
                        url: url.to_string(),
                        limit: MAX_REDIRECTS,
                    }
                    .into());
                }
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| download_failed(&current, status))?;
                let next = current
                    .join(location)
                    .with_context(|| format!("Invalid redirect location: {}", location))?;
                debug!("Following redirect {} -> {}", current, next);
                current = next;
                redirects += 1;
                continue;
            }

            if status != StatusCode::OK {
                return Err(download_failed(&current, status).into());
            }

            return Ok(response);
        }
    }

    /// Downloads a URL into the writer produced by `create_writer`.
    /// The writer is only created once a `200 OK` has been received.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<u64>
    where
        W: Write,
        F: FnOnce() -> Result<W>,
    {
        let mut response = self.get(url).await?;
        let final_url = response.url().to_string();

        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| ShimError::Transport {
                url: final_url.clone(),
                source,
            })?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush downloaded file")?;

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(downloaded_bytes)
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn download_failed(url: &Url, status: StatusCode) -> ShimError {
    ShimError::DownloadFailed {
        url: url.to_string(),
        status_code: status.as_u16(),
        status_message: status.canonical_reason().unwrap_or("").to_string(),
    }
}
