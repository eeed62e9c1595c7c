//! Client-side progression logic for waybook frontends.
//!
//! Everything here is pure and UI-framework-agnostic: a frontend (web view,
//! TUI, test harness) owns the timers and the HTTP transport, feeds events
//! in, and executes the effects that come back out.
//!
//! - [`ProgressionMachine`] decides what is revealed, when drafts autosave,
//!   and when the view advances past an answered block.
//! - [`HistoryAccumulator`] merges bidirectionally fetched history pages
//!   into one ordered, duplicate-free view.

pub mod history;
pub mod progression;
pub mod save;

pub use history::HistoryAccumulator;
pub use progression::{
    Effect, Event, Phase, ProgressionMachine, AUTO_SAVE_DELAY, SETTLE_DELAY,
};
pub use save::{SaveCommand, SaveError, SaveKind, SaveResult};
