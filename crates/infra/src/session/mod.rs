//! Reader session state derived from lifecycle and gateway events

pub mod context;

pub use context::{SessionContext, SessionRoute};
