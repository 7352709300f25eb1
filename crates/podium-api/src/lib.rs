pub mod auth;
pub mod convert;
pub mod error;
pub mod extract;
pub mod items;
pub mod media;
pub mod profiles;
pub mod rankings;
pub mod reorder;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::media::MediaStore;
use podium_db::Database;

pub type AppState = Arc<AppStateInner>;

/// Shared state injected into every handler. Built once in main; no
/// module-level singletons.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub media: MediaStore,
    pub jwt_secret: String,
    /// Single-flight guard for rank reordering: item ids with a swap in
    /// flight. A second move for the same item is rejected until the first
    /// completes.
    pub reorder_locks: Mutex<HashSet<Uuid>>,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, media: MediaStore, jwt_secret: String) -> Self {
        Self {
            db,
            media,
            jwt_secret,
            reorder_locks: Mutex::new(HashSet::new()),
        }
    }
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("task join error: {e}"))
        })?
        .map_err(ApiError::from)
}
