//! # Newsline Infrastructure
//!
//! I/O-bound implementations for the Newsline session core.
//!
//! This crate contains:
//! - The authenticated request gateway and the HTTP refresh client
//! - Login, signup, logout and profile operations
//! - Session context (route and security alert state)
//! - The JSON-file session store
//! - Configuration loading and logging setup
//!
//! ## Architecture
//! - Implements contracts defined in `newsline-common` (`RefreshClient`,
//!   `KeyValueStore`)
//! - Depends on `newsline-domain` and `newsline-common`
//! - Contains all network and filesystem code

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod session;
pub mod storage;

// Re-export commonly used items
pub use api::{
    ApiError, ApiGateway, ApiResponse, AuthApi, AuthApiError, GatewayConfig, HttpRefreshClient,
    RequestOptions, ResponseType,
};
pub use bootstrap::SessionCore;
pub use errors::InfraError;
pub use http::{HttpClient, RetryPolicy};
pub use session::{SessionContext, SessionRoute};
pub use storage::FileStore;
