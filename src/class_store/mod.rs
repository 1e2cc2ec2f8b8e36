//! # ClassSense Class Store
//!
//! Owns every class record and exposes the four operations the request layer
//! needs: create, sensor upsert, emotion append and state read.
//!
//! Two backends satisfy the same [`ClassStore`] contract:
//!
//! - [`InMemoryClassStore`] - a map of per-record locks, lost on restart
//! - [`PostgresClassStore`] - `classes` and `emotions` tables via `sqlx`
//!
//! The backend is picked once from [`StoreConfig`] by [`open_store`] and
//! shared as `Arc<dyn ClassStore>` for the life of the process.

pub mod clock;
pub mod code;
pub mod config;
pub mod errors;
pub mod memory;
pub mod postgres;
pub mod record;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

pub use clock::{Clock, ManualClock, SystemClock};
pub use code::{ClassCode, CodeGenerator, InvalidClassCode};
pub use config::{PostgresConfig, StoreBackend, StoreConfig};
pub use errors::{StoreError, StoreResult};
pub use memory::InMemoryClassStore;
pub use postgres::PostgresClassStore;
pub use record::{ClassRecord, ClassState, EmotionEntry, EmotionLog, Payload};

/// Storage contract shared by all backends.
///
/// Every operation either applies its whole effect or none of it. The one
/// exception is the PostgreSQL create, which reserves the code before writing
/// metadata; see [`PostgresClassStore`].
#[async_trait]
pub trait ClassStore: Send + Sync + std::fmt::Debug {
    /// Reserve a fresh code and attach `metadata` to it
    async fn create_class(&self, metadata: Payload) -> StoreResult<ClassCode>;

    /// Overwrite the last sensor reading and its timestamp
    async fn upsert_sensor(&self, code: &ClassCode, payload: Payload) -> StoreResult<()>;

    /// Append a feedback entry, evicting the oldest past capacity
    async fn add_emotion(&self, code: &ClassCode, payload: Payload) -> StoreResult<()>;

    /// Snapshot of one class, emotions oldest-to-newest
    async fn get_state(&self, code: &ClassCode) -> StoreResult<ClassState>;

    /// Backend liveness probe
    async fn ping(&self) -> StoreResult<()>;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Construct the configured backend.
///
/// PostgreSQL connects and applies migrations before returning. A failed
/// connection is an error; there is no fallback to memory.
pub async fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn ClassStore>> {
    config.validate().map_err(StoreError::Backend)?;

    let emotion_limit = config.effective_emotion_limit();
    let store: Arc<dyn ClassStore> = match config.backend {
        StoreBackend::Memory => Arc::new(InMemoryClassStore::new(emotion_limit)),
        StoreBackend::Postgres => {
            let pg = config.postgres.as_ref().ok_or_else(|| {
                StoreError::Backend("postgres backend selected without settings".to_string())
            })?;
            Arc::new(PostgresClassStore::connect(pg, emotion_limit).await?)
        }
    };

    info!(
        backend = store.backend_name(),
        emotion_limit, "class store ready"
    );
    Ok(store)
}
