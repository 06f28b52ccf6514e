//! Application state shared across handlers.

use crate::fetch::FetchEngine;
use crate::lifecycle::{Clock, Lifecycle};
use crate::ratelimit::RateLimitState;
use ferry_core::config::AppConfig;
use ferry_store::RegistrationStore;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Registration store.
    pub store: Arc<dyn RegistrationStore>,
    /// Registration lifecycle manager.
    pub lifecycle: Arc<Lifecycle>,
    /// Proxy fetch engine.
    pub fetcher: Arc<FetchEngine>,
    /// Rate limiting state.
    pub rate_limit: RateLimitState,
}

impl AppState {
    /// Create a new application state.
    ///
    /// This validates the configuration and logs warnings for suspicious
    /// but allowed settings.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid or the upstream HTTP client
    /// cannot be constructed.
    pub fn new(config: AppConfig, store: Arc<dyn RegistrationStore>) -> Self {
        Self::build(config, store, None)
    }

    /// Create a state whose lifecycle manager reads an explicit clock.
    pub fn with_clock(config: AppConfig, store: Arc<dyn RegistrationStore>, clock: Clock) -> Self {
        Self::build(config, store, Some(clock))
    }

    fn build(config: AppConfig, store: Arc<dyn RegistrationStore>, clock: Option<Clock>) -> Self {
        match config.rate_limit.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    tracing::warn!("Configuration warning: {}", warning);
                }
            }
            Err(error) => {
                panic!("Invalid rate limit configuration: {}", error);
            }
        }

        match config.upstream.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    tracing::warn!("Configuration warning: {}", warning);
                }
            }
            Err(error) => {
                panic!("Invalid upstream configuration: {}", error);
            }
        }

        let fetcher = FetchEngine::new(&config.upstream)
            .unwrap_or_else(|e| panic!("Failed to build upstream HTTP client: {}", e));

        let lifecycle = match clock {
            Some(clock) => Lifecycle::with_clock(store.clone(), clock),
            None => Lifecycle::new(store.clone()),
        };

        let rate_limit = RateLimitState::new(&config.rate_limit);

        Self {
            config: Arc::new(config),
            store,
            lifecycle: Arc::new(lifecycle),
            fetcher: Arc::new(fetcher),
            rate_limit,
        }
    }

    /// Get the cleanup interval for the rate limiter, if enabled.
    /// Falls back to 60 seconds if the configured interval is zero (which
    /// would make tokio::time::interval panic).
    pub fn rate_limit_cleanup_interval(&self) -> Option<Duration> {
        if self.rate_limit.is_enabled() {
            let interval_secs = self.config.rate_limit.cleanup_interval_secs;
            if interval_secs == 0 {
                tracing::warn!("rate_limit.cleanup_interval_secs is 0, using default of 60 seconds");
                Some(Duration::from_secs(60))
            } else {
                Some(Duration::from_secs(interval_secs))
            }
        } else {
            None
        }
    }
}
