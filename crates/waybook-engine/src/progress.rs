//! Progress resolution and the current-position workbook page.
//!
//! Progress is derived, never stored: the highest sequence whose prompt or
//! tool the user has answered. Delivery extends exactly one block past it —
//! the user always sees everything they've covered plus the next thing to do.

use tracing::debug;

use crate::config::EngineConfig;
use crate::db::WorkbookDb;
use crate::error::Result;
use crate::merge::{merge, ResponseIndex};
use crate::pii::PiiCodec;
use waybook_types::{SessionId, UserId, WorkbookPage};

/// The sequence delivery extends to: one past progress, clamped to the
/// published end. A fresh user (progress 0) gets exactly block 1.
pub fn target_sequence(progress: u64, total_blocks: u64) -> u64 {
    (progress + 1).min(total_blocks)
}

/// Build the current-position page: blocks `1..=target`, merged with the
/// user's responses.
pub fn workbook_page(
    db: &WorkbookDb,
    cfg: &EngineConfig,
    pii: &dyn PiiCodec,
    session: SessionId,
    user: UserId,
) -> Result<WorkbookPage> {
    let progress = db.compute_progress(user)?;
    let total = db.max_sequence(cfg.published_max_part)?;
    if total == 0 {
        return Ok(WorkbookPage {
            blocks: Vec::new(),
            progress,
            has_more: false,
        });
    }

    let target = target_sequence(progress, total);
    let blocks = db.fetch_range(1, target, cfg.published_max_part)?;
    let responses = db.list_responses(user, None)?;
    let index = ResponseIndex::build(&responses, cfg, pii, session);
    debug!(%user, progress, target, total, "workbook page");

    Ok(WorkbookPage {
        blocks: merge(blocks, &index),
        progress,
        has_more: target < total,
    })
}

// ============================================================================
// Tests
// ============================================================================
