//! Stateless windowed pagination over covered material.
//!
//! Each request names a window; the engine clamps it to what the user has
//! earned (progress plus a small look-ahead allowance) and returns the
//! merged blocks with exercise boundaries for navigation. No cursor state
//! lives on the server, so overlapping concurrent windows are fine —
//! clients merge by block id.

use indexmap::IndexMap;
use tracing::debug;

use crate::config::EngineConfig;
use crate::db::WorkbookDb;
use crate::error::Result;
use crate::merge::{merge, ResponseIndex};
use crate::pii::PiiCodec;
use waybook_types::{
    BlockView, ExerciseBoundary, ExerciseRef, HistoryPage, Pagination, SessionId, UserId,
};

/// Raw pagination parameters as they arrive from a client.
#[derive(Debug, Default, Clone, Copy)]
pub struct HistoryRequest {
    /// First sequence wanted (default 1).
    pub from_sequence: Option<u64>,
    /// Last sequence wanted (default `from + limit - 1`).
    pub to_sequence: Option<u64>,
    /// Window size when `to_sequence` is absent (default 50, cap 100).
    pub limit: Option<u64>,
}

/// Build one history window for a user.
pub fn history_page(
    db: &WorkbookDb,
    cfg: &EngineConfig,
    pii: &dyn PiiCodec,
    session: SessionId,
    user: UserId,
    req: HistoryRequest,
) -> Result<HistoryPage> {
    let from = req.from_sequence.unwrap_or(1).max(1);
    let limit = cfg.clamp_limit(req.limit);
    let requested_to = req.to_sequence.unwrap_or(from + limit - 1);

    let progress = db.compute_progress(user)?;
    let effective_to = requested_to.min(progress + cfg.ahead_allowance);
    debug!(%user, from, requested_to, effective_to, progress, "history window");

    let blocks = if effective_to >= from {
        db.fetch_range(from, effective_to, cfg.published_max_part)?
    } else {
        Vec::new()
    };
    let responses = db.list_responses(user, None)?;
    let index = ResponseIndex::build(&responses, cfg, pii, session);
    let views = merge(blocks, &index);

    let exercise_boundaries = extract_boundaries(&views);
    let last_returned = views.last().map(|v| v.block.sequence);
    let pagination = Pagination {
        from_sequence: from,
        // An empty window still names the end it was clamped to, so clients
        // paging by to_sequence see where the window actually stopped.
        to_sequence: last_returned.unwrap_or(effective_to),
        has_more: last_returned.unwrap_or(from.saturating_sub(1)) < progress,
        has_previous: from > 1,
        total_blocks: db.count_up_to(progress)?,
    };

    Ok(HistoryPage {
        blocks: views,
        exercise_boundaries,
        pagination,
    })
}

/// First block of each distinct exercise in the window, titled by the
/// exercise's first heading when the window contains one.
pub fn extract_boundaries(views: &[BlockView]) -> Vec<ExerciseBoundary> {
    let mut groups: IndexMap<ExerciseRef, (u64, Option<String>)> = IndexMap::new();
    for view in views {
        let entry = groups
            .entry(view.block.exercise)
            .or_insert((view.block.sequence, None));
        entry.0 = entry.0.min(view.block.sequence);
        if entry.1.is_none() {
            if let Some(text) = view.block.content.heading_text() {
                entry.1 = Some(text.to_string());
            }
        }
    }
    groups
        .into_iter()
        .map(|(exercise_id, (start_sequence, title))| ExerciseBoundary {
            exercise_id,
            start_sequence,
            title: title.unwrap_or_else(|| format!("Exercise {exercise_id}")),
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{content_block, prompt_block, PrefixCodec};
    use waybook_types::ResponseTarget;

    /// 24 blocks across three exercises: a heading then prompts.
    /// Exercise 1.1.1 = seq 1..8, 1.1.2 = 9..16, 1.2.1 = 17..24.
    fn seeded_db() -> WorkbookDb {
        let db = WorkbookDb::in_memory().unwrap();
        for (i, ex, title) in [
            (0u64, "1.1.1", "Energy"),
            (8, "1.1.2", "Skills"),
            (16, "1.2.1", "Stories"),
        ] {
            db.insert_block(&content_block(i + 1, ex, (i + 1) as i64 + 100, "heading", title))
                .unwrap();
            for j in 2..=8u64 {
                db.insert_block(&prompt_block(
                    i + j,
                    ex,
                    (i + j) as i64,
                    "prompt",
                ))
                .unwrap();
            }
        }
        db
    }

    /// Answer every prompt up to the given sequence.
    fn answer_through(db: &WorkbookDb, user: UserId, upto: u64) {
        for seq in 1..=upto {
            let block = db.block_at(seq, 2).unwrap().unwrap();
            if let Some(pid) = block.prompt_id() {
                db.insert_response(user, ResponseTarget::Prompt(pid), block.exercise, None, "a")
                    .unwrap();
            }
        }
    }

    fn page(db: &WorkbookDb, user: UserId, req: HistoryRequest) -> HistoryPage {
        history_page(
            db,
            &EngineConfig::default(),
            &PrefixCodec,
            SessionId::new(),
            user,
            req,
        )
        .unwrap()
    }

    #[test]
    fn test_limit_window_against_progress() {
        let db = seeded_db();
        let user = UserId::new();
        answer_through(&db, user, 20);

        let hp = page(&db, user, HistoryRequest { limit: Some(5), ..Default::default() });
        assert_eq!(
            hp.blocks.iter().map(|v| v.block.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(hp.pagination.from_sequence, 1);
        assert_eq!(hp.pagination.to_sequence, 5);
        assert!(hp.pagination.has_more);
        assert!(!hp.pagination.has_previous);
        assert_eq!(hp.pagination.total_blocks, 20);
    }

    #[test]
    fn test_ahead_allowance_clamps_window() {
        let db = seeded_db();
        let user = UserId::new();
        answer_through(&db, user, 2);

        let hp = page(
            &db,
            user,
            HistoryRequest { from_sequence: Some(1), to_sequence: Some(50), ..Default::default() },
        );
        // progress 2 + allowance 10 = 12.
        assert_eq!(hp.blocks.last().unwrap().block.sequence, 12);
        assert_eq!(hp.pagination.to_sequence, 12);
        assert!(!hp.pagination.has_more); // everything answered is in-window
    }

    #[test]
    fn test_consecutive_windows_cover_without_gap_or_overlap() {
        let db = seeded_db();
        let user = UserId::new();
        answer_through(&db, user, 20);

        let first = page(&db, user, HistoryRequest { limit: Some(10), ..Default::default() });
        let next_from = first.pagination.to_sequence + 1;
        let second = page(
            &db,
            user,
            HistoryRequest { from_sequence: Some(next_from), limit: Some(10), ..Default::default() },
        );

        let mut seqs: Vec<u64> = first
            .blocks
            .iter()
            .chain(second.blocks.iter())
            .map(|v| v.block.sequence)
            .collect();
        let len = seqs.len();
        seqs.dedup();
        assert_eq!(seqs.len(), len);
        assert_eq!(seqs, (1..=20).collect::<Vec<_>>());
        assert!(second.pagination.has_previous);
        assert!(!second.pagination.has_more);
    }

    #[test]
    fn test_window_past_progress_is_empty() {
        let db = seeded_db();
        let user = UserId::new();
        answer_through(&db, user, 2);

        let hp = page(
            &db,
            user,
            HistoryRequest { from_sequence: Some(20), limit: Some(5), ..Default::default() },
        );
        assert!(hp.blocks.is_empty());
        assert!(!hp.pagination.has_more);
        assert!(hp.pagination.has_previous);
        // The clamp (progress 2 + allowance 10) is where the window ended,
        // even though nothing came back.
        assert_eq!(hp.pagination.from_sequence, 20);
        assert_eq!(hp.pagination.to_sequence, 12);
    }

    #[test]
    fn test_boundaries_one_per_exercise_with_heading_titles() {
        let db = seeded_db();
        let user = UserId::new();
        answer_through(&db, user, 20);

        let hp = page(&db, user, HistoryRequest { limit: Some(20), ..Default::default() });
        let bounds = &hp.exercise_boundaries;
        assert_eq!(bounds.len(), 3);
        assert_eq!(bounds[0].start_sequence, 1);
        assert_eq!(bounds[0].title, "Energy");
        assert_eq!(bounds[1].start_sequence, 9);
        assert_eq!(bounds[1].title, "Skills");
        assert_eq!(bounds[2].start_sequence, 17);
        assert_eq!(bounds[2].title, "Stories");
    }

    #[test]
    fn test_boundary_without_heading_falls_back_to_ref() {
        let db = seeded_db();
        let user = UserId::new();
        answer_through(&db, user, 20);

        // Window starts past exercise 1.1.2's heading.
        let hp = page(
            &db,
            user,
            HistoryRequest { from_sequence: Some(10), to_sequence: Some(12), ..Default::default() },
        );
        assert_eq!(hp.exercise_boundaries.len(), 1);
        assert_eq!(hp.exercise_boundaries[0].title, "Exercise 1.1.2");
        assert_eq!(hp.exercise_boundaries[0].start_sequence, 10);
    }

    #[test]
    fn test_merged_responses_appear_in_history() {
        let db = seeded_db();
        let user = UserId::new();
        answer_through(&db, user, 3);

        let hp = page(&db, user, HistoryRequest { limit: Some(3), ..Default::default() });
        assert_eq!(hp.blocks[1].response.as_deref(), Some("a"));
        assert_eq!(hp.blocks[0].response, None); // heading
    }
}
