//! Backend API access for Newsline
//!
//! # Architecture
//!
//! - [`ApiGateway`] issues every authenticated request, refreshing and
//!   retrying once on 401
//! - [`HttpRefreshClient`] is the lifecycle manager's view of
//!   `POST /auth/refresh`
//! - [`AuthApi`] wraps login, signup, logout and profile loading
//! - All traffic goes through [`crate::http::HttpClient`] (no direct reqwest
//!   clients) with a timeout on every call

pub mod auth;
pub mod errors;
pub mod gateway;
pub mod refresh;

pub use auth::{AuthApi, AuthApiError};
pub use errors::{ApiError, ApiErrorCategory};
pub use gateway::{ApiGateway, ApiResponse, GatewayConfig, RequestOptions, ResponseType};
pub use refresh::HttpRefreshClient;
