//! Platform resolution
//!
//! This module detects the host operating system and CPU architecture and
//! maps them onto the naming scheme used by showboat release artifacts.

mod descriptor;
mod detection;

pub use descriptor::{ArchName, OsName, PlatformDescriptor};
pub use detection::Platform;
