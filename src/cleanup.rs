use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Tracks paths an install has created so a failure can roll them back
#[derive(Debug, Default)]
pub struct CleanupContext {
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path to be removed if the install fails
    pub fn add(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Remove a path from cleanup list (e.g., when it has been consumed)
    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove every registered path, newest first. Failures are logged only.
    pub fn cleanup<R: Runtime>(&mut self, runtime: &R) {
        for path in self.paths.drain(..).rev() {
            if !runtime.exists(&path) {
                continue;
            }
            debug!("Cleaning up: {:?}", path);
            let result = if runtime.is_dir(&path) {
                runtime.remove_dir_all(&path)
            } else {
                runtime.remove_file(&path)
            };
            if let Err(e) = result {
                warn!("Failed to clean up {:?}: {}", path, e);
            }
        }
    }
}
