//! Waybook's delivery engine: progression, history pagination, response
//! saving, and connection resolution over a SQLite store.
//!
//! Everything here is synchronous and pure-ish: each operation is a function
//! of `(user, stored rows, request params)` with no server-side cursor or
//! session state beyond the database itself. The HTTP layer owns the shared
//! handle and locking; the engine takes `&WorkbookDb`.
//!
//! ```text
//! GET /workbook            → progress::workbook_page
//! GET /workbook/history    → history::history_page
//! POST|PUT /workbook/response → save::save_response
//! GET /data/connection     → connections::resolve
//! ```
//!
//! Failure posture: broken authored content (missing connections, malformed
//! JSON, unknown sources) degrades to empty results; structural validation
//! and storage faults are [`EngineError`].

pub mod config;
pub mod connections;
pub mod db;
pub mod error;
pub mod history;
pub mod merge;
pub mod pii;
pub mod progress;
pub mod save;

#[cfg(test)]
mod testutil;

pub use config::EngineConfig;
pub use connections::{resolve, DataSource};
pub use db::{ConnectionRow, WorkbookDb};
pub use error::{EngineError, Result};
pub use history::{history_page, HistoryRequest};
pub use merge::{decrypt_responses, merge, merge_one, ResponseIndex};
pub use pii::{IdentityCodec, PiiCodec};
pub use progress::{target_sequence, workbook_page};
pub use save::{save_response, SaveRequest};
