//! Session context
//!
//! Tracks the signed-in reader's profile and which area of the app they
//! belong in. State changes are driven by the lifecycle manager's events
//! (logout, rejected refresh, replay detection) and by the gateway's
//! onboarding gate, so the context stays correct even when the session
//! ends in the background.

use std::sync::Arc;

use newsline_common::auth::{SessionEvent, Subscription};
use newsline_domain::constants::SECURITY_BREACH_ALERT;
use newsline_domain::UserProfile;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::api::{ApiResponse, AuthApi, AuthApiError};

/// Area of the app the reader should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRoute {
    Login,
    Onboarding,
    Home,
}

#[derive(Debug, Default)]
struct ContextState {
    user: Option<UserProfile>,
    needs_onboarding: bool,
    security_alert: Option<String>,
    loading: bool,
}

impl ContextState {
    fn route(&self) -> SessionRoute {
        match &self.user {
            None => SessionRoute::Login,
            Some(_) if self.needs_onboarding => SessionRoute::Onboarding,
            Some(_) => SessionRoute::Home,
        }
    }

    fn sign_out(&mut self) {
        self.user = None;
        self.needs_onboarding = false;
    }

    fn sign_in(&mut self, user: UserProfile) {
        self.needs_onboarding = user.is_onboarded == Some(false);
        self.user = Some(user);
    }
}

/// Reader session driven by [`AuthApi`]
pub struct SessionContext {
    auth: AuthApi,
    state: Arc<Mutex<ContextState>>,
    subscriptions: Vec<Subscription>,
}

impl SessionContext {
    pub fn new(auth: AuthApi) -> Self {
        let state = Arc::new(Mutex::new(ContextState { loading: true, ..ContextState::default() }));
        let gateway = auth.gateway();

        let on_session = Arc::clone(&state);
        let session_events = gateway.tokens().subscribe(move |event| match event {
            SessionEvent::RefreshFailed | SessionEvent::LoggedOut { .. } => on_session.lock().sign_out(),
            _ => {}
        });

        let on_breach = Arc::clone(&state);
        let breach = gateway.on_security_breach(move || {
            let mut state = on_breach.lock();
            state.sign_out();
            state.security_alert = Some(SECURITY_BREACH_ALERT.to_string());
        });

        let on_onboarding = Arc::clone(&state);
        let onboarding = gateway.on_onboarding_required(move || {
            on_onboarding.lock().needs_onboarding = true;
        });

        Self { auth, state, subscriptions: vec![session_events, breach, onboarding] }
    }

    /// Load the profile when a session was restored; returns the route
    pub async fn initialize(&self) -> SessionRoute {
        if self.auth.gateway().tokens().is_authenticated() {
            match self.auth.fetch_profile().await {
                Ok(user) => self.state.lock().sign_in(user),
                Err(err) => warn!(error = %err, "failed to load profile for restored session"),
            }
        }

        let mut state = self.state.lock();
        state.loading = false;
        state.route()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionRoute, AuthApiError> {
        let user = self.auth.login(email, password).await?;
        let mut state = self.state.lock();
        state.sign_in(user);
        state.security_alert = None;
        info!(route = ?state.route(), "reader signed in");
        Ok(state.route())
    }

    pub async fn signup(&self, email: &str, password: &str, name: &str) -> Result<ApiResponse, AuthApiError> {
        self.auth.signup(email, password, name).await
    }

    pub async fn logout(&self) {
        self.auth.logout().await;
        self.state.lock().sign_out();
    }

    /// Record that the reader finished onboarding
    pub fn complete_onboarding(&self) {
        let mut state = self.state.lock();
        state.needs_onboarding = false;
        if let Some(user) = state.user.as_mut() {
            user.is_onboarded = Some(true);
        }
    }

    pub fn route(&self) -> SessionRoute {
        self.state.lock().route()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.lock().user.clone()
    }

    /// Signed in with a loaded profile
    pub fn is_authenticated(&self) -> bool {
        self.state.lock().user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn needs_onboarding(&self) -> bool {
        self.state.lock().needs_onboarding
    }

    pub fn security_alert(&self) -> Option<String> {
        self.state.lock().security_alert.clone()
    }

    pub fn dismiss_security_alert(&self) {
        self.state.lock().security_alert = None;
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext").field("state", &*self.state.lock()).finish_non_exhaustive()
    }
}
