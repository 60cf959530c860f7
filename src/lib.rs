pub mod archive;
pub mod cleanup;
pub mod download;
pub mod error;
pub mod http;
pub mod install;
pub mod launcher;
pub mod platform;
pub mod runtime;

pub use error::ShimError;
pub use install::ShimConfig;
pub use launcher::{Launcher, RunOptions, RunOutput};
