//! Server test utilities.

use ferry_core::config::AppConfig;
use ferry_server::{AppState, create_router};
use ferry_store::{FilesystemStore, RegistrationStore};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use time::OffsetDateTime;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let (temp_dir, store, config) = Self::fixtures(modifier).await;
        let state = AppState::new(config, store);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Create a test server whose clock the test can advance.
    pub async fn with_clock<F>(modifier: F) -> (Self, Arc<Mutex<OffsetDateTime>>)
    where
        F: FnOnce(&mut AppConfig),
    {
        let (temp_dir, store, config) = Self::fixtures(modifier).await;

        let now = Arc::new(Mutex::new(OffsetDateTime::now_utc()));
        let clock_now = now.clone();
        let state = AppState::with_clock(
            config,
            store,
            Arc::new(move || *clock_now.lock().unwrap()),
        );
        let router = create_router(state.clone());

        (
            Self {
                router,
                state,
                _temp_dir: temp_dir,
            },
            now,
        )
    }

    async fn fixtures<F>(modifier: F) -> (TempDir, Arc<dyn RegistrationStore>, AppConfig)
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("registrations");
        let store: Arc<dyn RegistrationStore> = Arc::new(
            FilesystemStore::new(&storage_path)
                .await
                .expect("Failed to create registration store"),
        );

        let mut config = AppConfig::for_testing();
        config.storage.path = storage_path;
        modifier(&mut config);

        (temp_dir, store, config)
    }

    /// Get access to the underlying store.
    pub fn store(&self) -> Arc<dyn RegistrationStore> {
        self.state.store.clone()
    }
}
