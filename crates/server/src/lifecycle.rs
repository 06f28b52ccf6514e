//! Registration lifecycle: creation, deletion, and read-time resolution.
//!
//! Expiry is enforced lazily here: every read checks the deadline and
//! removes the record on discovery. There is no background sweeper.

use ferry_core::{NewRegistration, Registration};
use ferry_store::{RegistrationStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

/// Injectable clock, so expiry boundaries are testable by simulated advance.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Failure modes of the create operation.
///
/// Everything that is not a duplicate id collapses into `Failed`: the
/// caller only learns that the registration could not be created.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error("registration already exists: {0}")]
    AlreadyExists(String),

    #[error("create failed: {0}")]
    Failed(String),
}

/// Failure mode of the delete operation.
///
/// The operation does not distinguish "was never there" from a storage
/// fault; both collapse into this one signal.
#[derive(Debug, Error)]
#[error("delete failed: {0}")]
pub struct DeleteError(pub String);

/// Failure modes of read-time resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("registration not found: {0}")]
    NotFound(String),

    #[error("registration expired: {0}")]
    Expired(String),

    #[error(transparent)]
    Storage(StoreError),
}

/// Validates, persists, and resolves registrations.
pub struct Lifecycle {
    store: Arc<dyn RegistrationStore>,
    clock: Clock,
}

impl Lifecycle {
    /// Create a lifecycle manager reading the system UTC clock.
    pub fn new(store: Arc<dyn RegistrationStore>) -> Self {
        Self::with_clock(store, Arc::new(OffsetDateTime::now_utc))
    }

    /// Create a lifecycle manager with an explicit clock.
    pub fn with_clock(store: Arc<dyn RegistrationStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    fn now(&self) -> OffsetDateTime {
        (self.clock)()
    }

    /// Validate and persist a new registration.
    ///
    /// Any relative expiry is resolved against the creation-time clock
    /// reading here, exactly once. Returns the stored record verbatim as
    /// confirmation.
    pub async fn create(&self, input: NewRegistration) -> Result<Registration, CreateError> {
        let record = input
            .into_registration(self.now())
            .map_err(|e| CreateError::Failed(e.to_string()))?;

        match self.store.put(&record).await {
            Ok(()) => {
                tracing::info!(id = %record.id, expires_at = ?record.expires_at, "Registration created");
                Ok(record)
            }
            Err(StoreError::AlreadyExists(id)) => Err(CreateError::AlreadyExists(id)),
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Registration create failed");
                Err(CreateError::Failed(e.to_string()))
            }
        }
    }

    /// Remove a registration unconditionally.
    pub async fn delete(&self, id: &str) -> Result<(), DeleteError> {
        match self.store.remove(id).await {
            Ok(()) => {
                tracing::info!(id = %id, "Registration deleted");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Registration delete failed");
                Err(DeleteError(e.to_string()))
            }
        }
    }

    /// Fetch a registration for the read path, enforcing expiry.
    ///
    /// An expired record is removed as a side effect of discovery; the
    /// removal is best-effort and its failure never masks the expiry
    /// signal (a concurrent explicit delete may already have won).
    pub async fn resolve_for_read(&self, id: &str) -> Result<Registration, ResolveError> {
        let record = match self.store.get(id).await {
            Ok(record) => record,
            Err(StoreError::NotFound(id)) => return Err(ResolveError::NotFound(id)),
            Err(e) => return Err(ResolveError::Storage(e)),
        };

        if record.is_expired(self.now()) {
            match self.store.remove(id).await {
                Ok(()) => tracing::info!(id = %id, "Expired registration removed"),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(id = %id, "Expired registration already removed")
                }
                Err(e) => tracing::warn!(id = %id, error = %e, "Failed to remove expired registration"),
            }
            return Err(ResolveError::Expired(id.to_string()));
        }

        Ok(record)
    }
}
