//! Application state management

use crate::auth::{CredentialCodec, IdentityService, MembershipService, PasswordConfig, PasswordError};
use crate::middleware::ApiMetrics;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tribe_core::{AppConfig, Store};

/// Failures while assembling the state at startup
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to prepare password hashing: {0}")]
    Password(#[from] PasswordError),

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Application state shared across handlers
///
/// The signing secret enters here once, inside the codec, and is never
/// reread or replaced while the server runs.
pub struct AppState {
    pub config: AppConfig,
    /// Record store collaborator
    pub store: Arc<dyn Store>,
    pub codec: CredentialCodec,
    pub identity: IdentityService,
    pub membership: MembershipService,
    pub metrics: ApiMetrics,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Result<Self, StateError> {
        let password_config = PasswordConfig::from(&config.auth);
        Self::with_password_config(config, store, password_config)
    }

    fn with_password_config(
        config: AppConfig,
        store: Arc<dyn Store>,
        password_config: PasswordConfig,
    ) -> Result<Self, StateError> {
        let codec = CredentialCodec::from_config(&config.auth);
        let identity = IdentityService::new(store.clone(), codec.clone(), password_config)?;
        let membership = MembershipService::new(store.clone(), codec.clone());

        Ok(Self {
            config,
            store,
            codec,
            identity,
            membership,
            metrics: ApiMetrics::new()?,
            start_time: Instant::now(),
        })
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl AppState {
    /// State over `store` with the default config and cheap Argon2 parameters
    pub fn for_testing(store: Arc<dyn Store>) -> Self {
        Self::with_password_config(AppConfig::default(), store, PasswordConfig::light())
            .expect("test state must build")
    }
}
