//! HTTP transport

mod client;

pub use client::{HttpClient, RetryPolicy};

/// `User-Agent` sent with every backend request
pub const USER_AGENT: &str = concat!("newsline/", env!("CARGO_PKG_VERSION"));
