//! Wiring for a complete client session
//!
//! [`SessionCore::start`] assembles the file store, the HTTP refresh
//! client, the lifecycle manager, the gateway and the account API from one
//! [`Config`].

use std::sync::Arc;

use newsline_common::auth::{SessionChannel, TokenLifecycleManager};
use newsline_common::storage::KeyValueStore;
use newsline_domain::{Config, NewslineError};
use tracing::info;

use crate::api::{ApiGateway, AuthApi, GatewayConfig, HttpRefreshClient};
use crate::storage::FileStore;

/// Started session components sharing one lifecycle manager
#[derive(Debug, Clone)]
pub struct SessionCore {
    pub tokens: Arc<TokenLifecycleManager>,
    pub gateway: Arc<ApiGateway>,
    pub auth: AuthApi,
}

impl SessionCore {
    /// Start with the configured [`FileStore`]
    ///
    /// # Errors
    /// Returns `NewslineError::Config` if an HTTP client cannot be built.
    pub async fn start(config: &Config, channel: SessionChannel) -> Result<Self, NewslineError> {
        let store = Arc::new(FileStore::from_config(&config.storage));
        Self::start_with_store(config, store, channel).await
    }

    /// Start over any durable store
    ///
    /// # Errors
    /// Returns `NewslineError::Config` if an HTTP client cannot be built.
    pub async fn start_with_store(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        channel: SessionChannel,
    ) -> Result<Self, NewslineError> {
        let refresh_client = Arc::new(HttpRefreshClient::new(config)?);
        let tokens = TokenLifecycleManager::builder(store, refresh_client).channel(channel).start().await;
        let gateway = Arc::new(ApiGateway::new(GatewayConfig::from(config), Arc::clone(&tokens))?);
        let auth = AuthApi::new(Arc::clone(&gateway));

        info!(
            base_url = %gateway.base_url(),
            binding = ?config.auth.refresh_binding,
            restored = tokens.is_authenticated(),
            "session core started"
        );
        Ok(Self { tokens, gateway, auth })
    }
}
