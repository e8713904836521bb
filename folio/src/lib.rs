//! Folio: a tag-record storage engine for building automation, backed by
//! a remote key/sorted-set store. This crate is the facade, wiring a
//! [`folio_wire::ConnPool`], a [`folio_store::RecordStore`] and a
//! [`folio_history::HistoryStore`] together behind one [`Engine`], and
//! carries the ambient config/logging surface the rest of the workspace
//! builds on.

mod config;
mod tracing_init;

use std::sync::Arc;

pub use folio_errors::{FolioError, Result};
pub use folio_history::{HistoryRead, HistoryStore, PostHisWriteHook, Span, WriteOpts, WriteOutcome};
pub use folio_store::{CommitHooks, Predicate, ReadOpts, RecordStore, RecordStoreStats, Sort};
pub use folio_types::{reserved, Diff, Dict, HisItem, Ref, Value, Word};
pub use folio_wire::ConnPool;

pub use config::{Config, ConfigBuilder};
pub use tracing_init::init_tracing;

/// The engine's single entry point: owns the connection pool and both
/// stores, and is the thing a host keeps around for the lifetime of a
/// connection to the remote store.
pub struct Engine {
    pub pool: Arc<ConnPool>,
    pub records: Arc<RecordStore>,
    pub history: Arc<HistoryStore>,
}

impl Engine {
    /// Opens a pool against `config.endpoint`, loads every record into the
    /// cache, and returns an engine ready to serve reads and accept
    /// commits. Uses no-op commit/history hooks; see
    /// [`Self::open_with_hooks`] to supply your own.
    pub async fn open(config: Config) -> Result<Arc<Self>> {
        Self::open_with_hooks(config, Arc::new(()), Arc::new(())).await
    }

    pub async fn open_with_hooks(
        config: Config,
        commit_hooks: Arc<dyn CommitHooks>,
        his_hooks: Arc<dyn PostHisWriteHook>,
    ) -> Result<Arc<Self>> {
        let pool_config = config.pool_config()?;
        let pool = ConnPool::new(pool_config);
        let records = RecordStore::new(pool.clone(), config.id_index_key.clone(), commit_hooks);
        records.load().await?;
        let history = Arc::new(HistoryStore::new(pool.clone(), records.clone(), his_hooks));
        Ok(Arc::new(Engine {
            pool,
            records,
            history,
        }))
    }

    pub fn stats(&self) -> RecordStoreStats {
        self.records.stats()
    }
}
