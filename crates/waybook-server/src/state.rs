//! Shared server state.

use std::sync::{Arc, Mutex, MutexGuard};

use waybook_engine::{EngineConfig, PiiCodec, WorkbookDb};

/// Shared handle to the workbook database.
pub type DbHandle = Arc<Mutex<WorkbookDb>>;

/// Everything a request handler needs.
#[derive(Clone)]
pub struct AppState {
    pub db: DbHandle,
    pub cfg: Arc<EngineConfig>,
    pub pii: Arc<dyn PiiCodec>,
}

impl AppState {
    pub fn new(db: WorkbookDb, cfg: EngineConfig, pii: Arc<dyn PiiCodec>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            cfg: Arc::new(cfg),
            pii,
        }
    }

    /// Lock the database handle. A poisoned lock is recovered: the store
    /// itself stays consistent because every engine write is a single
    /// statement.
    pub fn db(&self) -> MutexGuard<'_, WorkbookDb> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}
