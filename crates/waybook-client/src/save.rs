//! Save commands and outcomes.
//!
//! The progression machine never performs IO. When a response needs to be
//! persisted it emits a [`SaveCommand`] effect; the embedding client executes
//! it (HTTP POST or PUT against the server) and feeds the outcome back as a
//! `SaveResolved` event, quoting the command's ticket.

use thiserror::Error;
use waybook_types::{ExerciseRef, ResponseTarget};

/// Why a save command is being issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    /// Debounced background save of a draft in progress.
    Autosave,
    /// Explicit submit of the current block's answer.
    Submit,
    /// Revision of an already-answered block (maps to PUT).
    Edit,
}

/// One persistence request emitted by the machine.
///
/// `ticket` is unique per machine instance; the resolution event must echo
/// it so late or reordered outcomes can be matched to their command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveCommand {
    pub ticket: u64,
    pub kind: SaveKind,
    pub target: ResponseTarget,
    pub exercise: ExerciseRef,
    pub activity_id: Option<i64>,
    pub text: String,
}

impl SaveCommand {
    /// Edits go through the update route; everything else creates-or-updates.
    pub fn is_update(&self) -> bool {
        self.kind == SaveKind::Edit
    }
}

/// Failure reported back for a save command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaveError {
    /// The server answered with a non-success status. The write did not land.
    #[error("save rejected with status {status}")]
    Rejected { status: u16 },
    /// The request never completed (network failure, timeout).
    #[error("server unreachable")]
    Unreachable,
}

/// Outcome of executing a save command.
pub type SaveResult = Result<(), SaveError>;
