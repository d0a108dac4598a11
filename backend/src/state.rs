use std::sync::Arc;

use crate::{
    config::Config,
    repositories::principal::PrincipalStore,
    services::{
        passcode::StaticPasscodeVerifier,
        session_manager::{SessionManager, SessionPolicy},
    },
    utils::{jwt::TokenCodec, password::SecretHasher},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(config: Arc<Config>, sessions: Arc<SessionManager>) -> Self {
        Self { config, sessions }
    }

    /// Wires the session manager from configuration over the given store.
    pub fn from_config(config: Config, store: Arc<dyn PrincipalStore>) -> anyhow::Result<Self> {
        let manager = SessionManager::new(
            store,
            TokenCodec::from_config(&config),
            SecretHasher::from_config(&config)?,
            Arc::new(StaticPasscodeVerifier::from_config(&config)),
            SessionPolicy::from_config(&config),
        );
        Ok(Self::new(Arc::new(config), Arc::new(manager)))
    }

    pub fn codec(&self) -> &TokenCodec {
        self.sessions.codec()
    }
}
