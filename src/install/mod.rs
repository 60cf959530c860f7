mod config;
mod layout;
mod receipt;

pub use config::{DEFAULT_BASE_URL, PINNED_VERSION, ShimConfig};
pub use layout::{
    InstallLayout, default_install_root, host_binary_name, locate_install_root,
    search_install_roots, system_install_root,
};
pub use receipt::InstallReceipt;

pub(crate) use layout::is_regular_file;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::{
    archive::find_binary,
    cleanup::CleanupContext,
    download::download_file,
    error::ShimError,
    http::HttpClient,
    platform::{Platform, PlatformDescriptor},
    runtime::Runtime,
};

pub struct Installer<R: Runtime> {
    pub runtime: R,
    pub http_client: HttpClient,
    pub config: ShimConfig,
}

impl<R: Runtime> Installer<R> {
    pub fn new(runtime: R, http_client: HttpClient, config: ShimConfig) -> Self {
        Self {
            runtime,
            http_client,
            config,
        }
    }

    /// Downloads, extracts and places the binary. Returns its path.
    ///
    /// Either a runnable binary ends up at `<root>/bin/<name>` or everything
    /// this call created is removed again.
    #[tracing::instrument(skip(self))]
    pub async fn install(&self, platform: &PlatformDescriptor, force: bool) -> Result<PathBuf> {
        let layout = self.config.layout(&self.runtime)?;
        let binary_path = layout.binary_path(platform);

        if !force && self.is_up_to_date(&layout, &binary_path) {
            println!(
                "showboat {} is already installed at {}",
                self.config.version,
                binary_path.display()
            );
            return Ok(binary_path);
        }

        println!("Installing showboat {}...", self.config.version);
        let url = self.config.download_url(platform);
        println!("Downloading from: {}", url);

        let bin_dir = layout.bin_dir();
        self.runtime
            .create_dir_all(&bin_dir)
            .with_context(|| format!("Failed to create directory {:?}", bin_dir))?;

        let mut cleanup = CleanupContext::new();
        if let Err(e) = self
            .place_binary(&layout, platform, &url, &binary_path, &mut cleanup)
            .await
        {
            debug!("Install failed, rolling back: {:#}", e);
            cleanup.cleanup(&self.runtime);
            return Err(e);
        }

        let receipt = InstallReceipt::new(&self.config.version, &url, platform);
        if let Err(e) = receipt.save(&self.runtime, &layout.receipt_path()) {
            warn!("{:#}", e);
        }

        println!("showboat installed successfully!");
        Ok(binary_path)
    }

    async fn place_binary(
        &self,
        layout: &InstallLayout,
        platform: &PlatformDescriptor,
        url: &str,
        binary_path: &Path,
        cleanup: &mut CleanupContext,
    ) -> Result<()> {
        let archive_path = layout.archive_path(platform.archive);
        cleanup.add(archive_path.clone());
        download_file(&self.runtime, url, &archive_path, &self.http_client).await?;

        println!("Download complete. Extracting...");
        let staging = layout.staging_dir();
        if self.runtime.exists(&staging) {
            debug!("Removing stale staging directory {:?}", staging);
            self.runtime.remove_dir_all(&staging)?;
        }
        self.runtime.create_dir_all(&staging)?;
        cleanup.add(staging.clone());

        platform
            .archive
            .extract(&self.runtime, &archive_path, &staging)?;

        let binary_name = platform.binary_name();
        let extracted = find_binary(&self.runtime, &staging, binary_name)?.ok_or_else(|| {
            ShimError::ExtractionFailed {
                archive: archive_path.clone(),
                reason: format!("archive does not contain {}", binary_name),
            }
        })?;

        if self.runtime.exists(binary_path) {
            debug!("Replacing existing binary {:?}", binary_path);
            self.runtime.remove_file(binary_path)?;
        }
        self.runtime
            .rename(&extracted, binary_path)
            .with_context(|| format!("Failed to move binary to {:?}", binary_path))?;
        cleanup.add(binary_path.to_path_buf());

        self.runtime
            .remove_file(&archive_path)
            .with_context(|| format!("Failed to clean up archive {:?}", archive_path))?;
        cleanup.remove(&archive_path);
        self.runtime.remove_dir_all(&staging)?;
        cleanup.remove(&staging);

        if platform.needs_exec_permission() {
            debug!("Setting executable permission on {:?}", binary_path);
            self.runtime.set_permissions(binary_path, 0o755)?;
        }

        if !is_native_executable(&self.runtime, binary_path) {
            warn!(
                "{:?} is not a recognized native executable; it may fail to start",
                binary_path
            );
        }

        cleanup.remove(binary_path);
        Ok(())
    }

    fn is_up_to_date(&self, layout: &InstallLayout, binary_path: &Path) -> bool {
        if !self.runtime.exists(binary_path) {
            return false;
        }
        match InstallReceipt::load_optional(&self.runtime, &layout.receipt_path()) {
            Some(receipt) if receipt.version == self.config.version => true,
            Some(receipt) => {
                info!(
                    "Installed version {} differs from {}",
                    receipt.version, self.config.version
                );
                false
            }
            None => false,
        }
    }

}

/// Removes the binary and its receipt. Returns false if nothing was installed.
#[tracing::instrument(skip(runtime))]
pub fn remove_installed<R: Runtime>(
    runtime: &R,
    layout: &InstallLayout,
    platform: &PlatformDescriptor,
) -> Result<bool> {
    let mut removed = false;
    for path in [layout.binary_path(platform), layout.receipt_path()] {
        if runtime.exists(&path) {
            runtime
                .remove_file(&path)
                .with_context(|| format!("Failed to remove {:?}", path))?;
            removed = true;
        }
    }
    Ok(removed)
}

/// Whether the file parses as an ELF, Mach-O or PE executable.
fn is_native_executable<R: Runtime>(runtime: &R, path: &Path) -> bool {
    let mut file = match runtime.open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut buffer = Vec::new();
    if file.read_to_end(&mut buffer).is_err() {
        return false;
    }

    matches!(
        goblin::Object::parse(&buffer),
        Ok(goblin::Object::Elf(_)) | Ok(goblin::Object::Mach(_)) | Ok(goblin::Object::PE(_))
    )
}

/// Installs showboat for the host platform.
#[tracing::instrument(skip(runtime, config))]
pub async fn install<R: Runtime>(runtime: R, config: ShimConfig, force: bool) -> Result<PathBuf> {
    let platform = Platform::detect().resolve()?;
    let http_client = HttpClient::build()?;
    Installer::new(runtime, http_client, config)
        .install(&platform, force)
        .await
}

/// Removes the host platform's binary and receipt.
#[tracing::instrument(skip(runtime, config))]
pub fn uninstall<R: Runtime>(runtime: R, config: ShimConfig) -> Result<bool> {
    let platform = Platform::detect().resolve()?;
    let layout = config.layout(&runtime)?;
    remove_installed(&runtime, &layout, &platform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::{tar_gz_bytes, zip_bytes};
    use crate::error::find_shim_error;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn installer(server_url: &str, root: &TempDir) -> Installer<RealRuntime> {
        let config = ShimConfig::new(
            Some(root.path().to_path_buf()),
            Some(server_url.to_string()),
            Some("0.4.0".to_string()),
        );
        Installer::new(RealRuntime, HttpClient::build().unwrap(), config)
    }

    fn linux() -> PlatformDescriptor {
        PlatformDescriptor::resolve("linux", "x64").unwrap()
    }

    fn bin_dir_entries(root: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(root.path().join("bin"))
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_install_tar_gz() {
        let mut server = mockito::Server::new_async().await;
        let archive = tar_gz_bytes(&[
            ("showboat", "#!/bin/sh\necho showboat 0.4.0\n", 0o644),
            ("LICENSE", "Apache-2.0", 0o644),
        ])
        .unwrap();
        let mock = server
            .mock("GET", "/v0.4.0/showboat-linux-amd64.tar.gz")
            .with_status(200)
            .with_body(archive)
            .create_async()
            .await;

        let root = tempdir().unwrap();
        let path = installer(&server.url(), &root)
            .install(&linux(), false)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(path, root.path().join("bin").join("showboat"));
        assert!(
            fs::read_to_string(&path)
                .unwrap()
                .contains("showboat 0.4.0")
        );
        // Archive and staging directory are gone; LICENSE was not copied out.
        assert_eq!(
            bin_dir_entries(&root),
            vec![".showboat-install.json".to_string(), "showboat".to_string()]
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert!(mode & 0o100 != 0, "owner execute missing: {:o}", mode);
            assert!(mode & 0o400 != 0, "owner read missing: {:o}", mode);
        }
    }

    #[tokio::test]
    async fn test_install_zip_for_windows() {
        let mut server = mockito::Server::new_async().await;
        let archive = zip_bytes(&[("showboat-windows-amd64/showboat.exe", "MZ", 0o644)]).unwrap();
        let _mock = server
            .mock("GET", "/v0.4.0/showboat-windows-amd64.zip")
            .with_status(200)
            .with_body(archive)
            .create_async()
            .await;

        let root = tempdir().unwrap();
        let windows = PlatformDescriptor::resolve("windows", "x64").unwrap();
        let path = installer(&server.url(), &root)
            .install(&windows, false)
            .await
            .unwrap();

        assert_eq!(path, root.path().join("bin").join("showboat.exe"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "MZ");
        assert!(!root.path().join("bin/showboat.zip").exists());
        assert!(!root.path().join("bin/.showboat-extract").exists());
    }

    #[tokio::test]
    async fn test_install_follows_redirect() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let archive = tar_gz_bytes(&[("showboat", "redirected", 0o755)]).unwrap();
        let _redirect = server
            .mock("GET", "/v0.4.0/showboat-linux-amd64.tar.gz")
            .with_status(302)
            .with_header("location", &format!("{}/objects/release-asset", url))
            .create_async()
            .await;
        let _target = server
            .mock("GET", "/objects/release-asset")
            .with_status(200)
            .with_body(archive)
            .create_async()
            .await;

        let root = tempdir().unwrap();
        let path = installer(&url, &root).install(&linux(), false).await.unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "redirected");
    }

    #[test_log::test(tokio::test)]
    async fn test_install_download_failure_leaves_nothing() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v0.4.0/showboat-linux-amd64.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let root = tempdir().unwrap();
        let err = installer(&server.url(), &root)
            .install(&linux(), false)
            .await
            .unwrap_err();

        assert!(matches!(
            find_shim_error(&err),
            Some(ShimError::DownloadFailed {
                status_code: 404,
                ..
            })
        ));
        assert!(bin_dir_entries(&root).is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_install_archive_without_binary_leaves_nothing() {
        let mut server = mockito::Server::new_async().await;
        let archive = tar_gz_bytes(&[("README.md", "no binary here", 0o644)]).unwrap();
        let _mock = server
            .mock("GET", "/v0.4.0/showboat-linux-amd64.tar.gz")
            .with_status(200)
            .with_body(archive)
            .create_async()
            .await;

        let root = tempdir().unwrap();
        let err = installer(&server.url(), &root)
            .install(&linux(), false)
            .await
            .unwrap_err();

        match find_shim_error(&err) {
            Some(ShimError::ExtractionFailed { reason, .. }) => {
                assert!(reason.contains("showboat"))
            }
            other => panic!("Expected ExtractionFailed, got {:?}", other),
        }
        assert!(bin_dir_entries(&root).is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_install_corrupt_archive_leaves_nothing() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v0.4.0/showboat-linux-amd64.tar.gz")
            .with_status(200)
            .with_body("<html>not an archive</html>")
            .create_async()
            .await;

        let root = tempdir().unwrap();
        let err = installer(&server.url(), &root)
            .install(&linux(), false)
            .await
            .unwrap_err();

        assert!(matches!(
            find_shim_error(&err),
            Some(ShimError::ExtractionFailed { .. })
        ));
        assert!(bin_dir_entries(&root).is_empty());
    }

    #[tokio::test]
    async fn test_install_skips_when_up_to_date() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v0.4.0/showboat-linux-amd64.tar.gz")
            .expect(0)
            .create_async()
            .await;

        let root = tempdir().unwrap();
        let installer = installer(&server.url(), &root);
        let layout = InstallLayout::new(root.path());
        fs::create_dir_all(layout.bin_dir()).unwrap();
        fs::write(layout.binary_path(&linux()), "existing").unwrap();
        InstallReceipt::new("0.4.0", "http://old", &linux())
            .save(&RealRuntime, &layout.receipt_path())
            .unwrap();

        let path = installer.install(&linux(), false).await.unwrap();

        mock.assert_async().await;
        assert_eq!(fs::read_to_string(path).unwrap(), "existing");
    }

    #[tokio::test]
    async fn test_install_force_and_version_change_redownload() {
        let mut server = mockito::Server::new_async().await;
        let archive = tar_gz_bytes(&[("showboat", "fresh", 0o755)]).unwrap();
        let mock = server
            .mock("GET", "/v0.4.0/showboat-linux-amd64.tar.gz")
            .with_status(200)
            .with_body(archive)
            .expect(2)
            .create_async()
            .await;

        let root = tempdir().unwrap();
        let installer = installer(&server.url(), &root);
        let layout = InstallLayout::new(root.path());
        fs::create_dir_all(layout.bin_dir()).unwrap();
        fs::write(layout.binary_path(&linux()), "stale").unwrap();
        InstallReceipt::new("0.3.0", "http://old", &linux())
            .save(&RealRuntime, &layout.receipt_path())
            .unwrap();

        // Different version in the receipt.
        installer.install(&linux(), false).await.unwrap();
        assert_eq!(fs::read_to_string(layout.binary_path(&linux())).unwrap(), "fresh");

        // Same version, forced.
        installer.install(&linux(), true).await.unwrap();
        mock.assert_async().await;

        let receipt = InstallReceipt::load(&RealRuntime, &layout.receipt_path()).unwrap();
        assert_eq!(receipt.version, "0.4.0");
    }

    #[tokio::test]
    async fn test_install_replaces_stale_staging_dir() {
        let mut server = mockito::Server::new_async().await;
        let archive = tar_gz_bytes(&[("showboat", "new", 0o755)]).unwrap();
        let _mock = server
            .mock("GET", "/v0.4.0/showboat-linux-amd64.tar.gz")
            .with_status(200)
            .with_body(archive)
            .create_async()
            .await;

        let root = tempdir().unwrap();
        let layout = InstallLayout::new(root.path());
        fs::create_dir_all(layout.staging_dir().join("old")).unwrap();
        fs::write(layout.staging_dir().join("old/showboat"), "leftover").unwrap();

        let path = installer(&server.url(), &root)
            .install(&linux(), false)
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "new");
        assert!(!layout.staging_dir().exists());
    }

    #[test]
    fn test_remove_installed() {
        let root = tempdir().unwrap();
        let layout = InstallLayout::new(root.path());

        assert!(!remove_installed(&RealRuntime, &layout, &linux()).unwrap());

        fs::create_dir_all(layout.bin_dir()).unwrap();
        fs::write(layout.binary_path(&linux()), "bin").unwrap();
        fs::write(layout.receipt_path(), "{}").unwrap();

        assert!(remove_installed(&RealRuntime, &layout, &linux()).unwrap());
        assert!(!layout.binary_path(&linux()).exists());
        assert!(!layout.receipt_path().exists());
    }

    #[test]
    fn test_is_native_executable_rejects_scripts() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("showboat");
        fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();

        assert!(!is_native_executable(&RealRuntime, &script));
        assert!(!is_native_executable(&RealRuntime, &dir.path().join("missing")));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_is_native_executable_accepts_elf() {
        let sh = Path::new("/bin/sh");
        if sh.exists() {
            assert!(is_native_executable(&RealRuntime, sh));
        }
    }
}
