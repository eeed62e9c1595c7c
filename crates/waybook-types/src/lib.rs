//! Shared identity, block, and wire types for Waybook.
//!
//! This crate is the relational foundation: typed IDs, exercise references,
//! the block/response model, connections, and the wire pages the server and
//! client exchange. It has **no internal waybook dependencies** — a pure
//! leaf crate that other crates build on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Curriculum block (sequence) ← one global, gapless order
//!     └── lives in Exercise (ExerciseRef = part.module.exercise)
//!     └── is content | prompt | tool (BlockKind → BlockContent)
//!     └── may declare a Connection (auto-populated data)
//!
//! User (UserId)
//!     └── authenticates via Session (SessionId)
//!     └── answers prompt/tool blocks with Response (ResponseId)
//!     └── progress = highest answered sequence (derived, never stored)
//! ```
//!
//! # Key Types
//!
//! |----------------------|--------------------------------------------|
//! | Type                 | Purpose                                    |
//! |----------------------|--------------------------------------------|
//! | [`UserId`]           | Who                                        |
//! | [`SessionId`]        | Which authenticated session                |
//! | [`ResponseId`]       | Which saved answer                         |
//! | [`ExerciseRef`]      | Where in the curriculum (part.module.ex)   |
//! | [`Block`]            | One curriculum row at its sequence         |
//! | [`BlockView`]        | Block + the user's response, merged        |
//! | [`Response`]         | Saved answer (prompt XOR tool)             |
//! | [`ConnectionResult`] | Resolved cross-exercise data               |
//! | [`WorkbookPage`]     | Current-position delivery                  |
//! | [`HistoryPage`]      | One paginated window of covered material   |
//! |----------------------|--------------------------------------------|

pub mod block;
pub mod connection;
pub mod exercise;
pub mod ids;
pub mod pages;
pub mod response;

// Re-export primary types at crate root for convenience.
pub use block::{
    Block, BlockContent, BlockKind, BlockView, ContentBody, ExerciseBoundary, PromptBody, ToolBody,
};
pub use connection::{ConnectionMethod, ConnectionResult, ConnectionType, TransformParams};
pub use exercise::{ExerciseRef, ExerciseRefError};
pub use ids::{ResponseId, SessionId, UserId};
pub use pages::{HistoryPage, Pagination, SaveAck, WorkbookPage};
pub use response::{Response, ResponseTarget, ResponseTargetError};

/// Current time as Unix milliseconds. Used by record constructors downstream.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
