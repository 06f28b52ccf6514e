//! Registration storage abstraction and backends for Ferry.
//!
//! This crate provides:
//! - The `RegistrationStore` trait (put / get / remove / exists)
//! - A local filesystem backend storing one JSON document per id

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemStore;
pub use error::{StoreError, StoreResult};
pub use traits::RegistrationStore;

use ferry_core::config::StorageConfig;
use std::sync::Arc;

/// Create a registration store from configuration.
pub async fn from_config(config: &StorageConfig) -> StoreResult<Arc<dyn RegistrationStore>> {
    let backend = FilesystemStore::new(&config.path).await?;
    Ok(Arc::new(backend))
}
