//! # Newsline Domain
//!
//! Session and account types shared by the Newsline client crates.
//!
//! This crate contains:
//! - Token pair, refresh response and persisted session records
//! - User profile and credential payloads
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Storage keys and refresh constants
//!
//! ## Architecture
//! - No dependencies on other Newsline crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
