//! Session token lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────┐
//! │ TokenLifecycleManager  │  Pair ownership, refresh timer, replay guard
//! └───────────┬────────────┘
//!             │
//!             ├──► RefreshClient      (backend refresh call, injected)
//!             ├──► TokenStore         (KeyValueStore persistence)
//!             ├──► UsedTokenHistory   (bounded FIFO of spent refresh ids)
//!             ├──► TokenDecoder       (exp / jti claims, JwtDecoder default)
//!             ├──► ListenerRegistry   (SessionEvent fan-out)
//!             └──► SessionChannel     (cross-instance logout + history sync)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use newsline_common::auth::{SessionEvent, TokenLifecycleManager};
//! use newsline_common::storage::MemoryStore;
//! use newsline_common::testing::MockRefreshClient;
//! use newsline_domain::TokenPair;
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = TokenLifecycleManager::builder(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(MockRefreshClient::new()),
//!     )
//!     .start()
//!     .await;
//!
//!     let subscription = manager.subscribe(|event| {
//!         if *event == SessionEvent::SecurityBreach {
//!             eprintln!("session invalidated");
//!         }
//!     });
//!
//!     manager.set_tokens(TokenPair::new("access", "refresh")).await;
//!     let _fresh = manager.refresh_access_token().await;
//!     subscription.unsubscribe();
//! }
//! ```

pub mod channel;
pub mod events;
pub mod history;
pub mod jwt;
pub mod schedule;
pub mod token_manager;
pub mod token_store;
pub mod traits;

pub use channel::{InstanceSignal, SessionChannel, SignalKind};
pub use events::{ListenerRegistry, SessionEvent, Subscription};
pub use history::UsedTokenHistory;
pub use jwt::{decode_expiry, decode_token_id, JwtDecoder, TokenDecodeError, TokenDecoder};
pub use schedule::{plan_refresh, plan_refresh_at, RefreshPlan};
pub use token_manager::{TokenLifecycleManager, TokenLifecycleManagerBuilder};
pub use token_store::TokenStore;
pub use traits::{RefreshClient, RefreshError};
