//! HTTP client module with bounded redirect following.

mod client;

pub use client::{HttpClient, MAX_REDIRECTS, USER_AGENT};
