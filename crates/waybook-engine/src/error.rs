//! Engine error type.

use thiserror::Error;
use waybook_types::{ExerciseRefError, ResponseTargetError};

/// Errors surfaced by engine operations.
///
/// Soft conditions (missing connection, malformed stored JSON, unknown data
/// source, decrypt failure) are *not* errors — they degrade to empty results
/// by design of the read paths. What's left here are structural validation
/// failures and genuine storage faults.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    ExerciseRef(#[from] ExerciseRefError),

    #[error(transparent)]
    Target(#[from] ResponseTargetError),

    /// PUT semantics: updating a response that was never created.
    #[error("no stored response to update")]
    ResponseNotFound,

    /// A sensitive tool response could not be encrypted. The save is
    /// rejected; storing plaintext is never an acceptable fallback.
    #[error("could not protect sensitive response")]
    EncryptFailed,
}

pub type Result<T> = std::result::Result<T, EngineError>;
