//! Store trait definitions.

use crate::error::StoreResult;
use async_trait::async_trait;
use ferry_core::Registration;

/// Durable mapping from identifier to registration record.
///
/// The store carries no business logic: expiry and duplicate policy live in
/// the lifecycle manager. Callers must not assume atomic check-then-act
/// across separate calls; `put`'s duplicate rejection is best-effort under
/// concurrent creators of the same id.
#[async_trait]
pub trait RegistrationStore: Send + Sync + 'static {
    /// Persist a record, failing with `AlreadyExists` if the id is present.
    async fn put(&self, record: &Registration) -> StoreResult<()>;

    /// Fetch a record, failing with `NotFound` if absent.
    async fn get(&self, id: &str) -> StoreResult<Registration>;

    /// Remove a record, failing with `NotFound` if absent.
    async fn remove(&self, id: &str) -> StoreResult<()>;

    /// Check whether a record exists.
    async fn exists(&self, id: &str) -> StoreResult<bool>;

    /// Verify the backing medium is reachable.
    ///
    /// Called during server startup so configuration errors surface before
    /// the first request. The default implementation succeeds.
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Static identifier for the backend type, used in logging.
    fn backend_name(&self) -> &'static str;
}
