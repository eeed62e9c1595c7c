//! Accumulates history pages fetched in either direction.
//!
//! A reader scrolling back through the workbook loads pages on demand: older
//! pages when scrolling up, newer ones when scrolling down. The accumulator
//! merges them into one ordered, duplicate-free view and tracks which
//! direction still has material to fetch.

use tracing::debug;
use waybook_types::{BlockView, ExerciseBoundary, HistoryPage};

/// Merged view over every history page loaded so far.
#[derive(Debug, Clone, Default)]
pub struct HistoryAccumulator {
    blocks: Vec<BlockView>,
    boundaries: Vec<ExerciseBoundary>,
    loaded_from: Option<u64>,
    loaded_to: Option<u64>,
    has_more: bool,
    has_previous: bool,
    total_blocks: u64,
}

impl HistoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fetched page in. Pages may arrive in any order and may
    /// overlap already-loaded ranges; blocks are deduplicated by id and kept
    /// sorted by sequence.
    pub fn merge_page(&mut self, page: HistoryPage) {
        let pagination = &page.pagination;
        debug!(
            from = pagination.from_sequence,
            to = pagination.to_sequence,
            blocks = page.blocks.len(),
            "merging history page"
        );

        for view in page.blocks {
            match self
                .blocks
                .binary_search_by_key(&view.block.sequence, |b| b.block.sequence)
            {
                // Re-fetched block: take the newer copy, its response may
                // have changed since the original fetch.
                Ok(i) => self.blocks[i] = view,
                Err(i) => self.blocks.insert(i, view),
            }
        }

        for boundary in page.exercise_boundaries {
            match self
                .boundaries
                .iter_mut()
                .find(|b| b.exercise_id == boundary.exercise_id)
            {
                Some(existing) => {
                    // A page deeper into the exercise saw a later start; the
                    // earliest sequence wins.
                    if boundary.start_sequence < existing.start_sequence {
                        *existing = boundary;
                    }
                }
                None => self.boundaries.push(boundary),
            }
        }
        self.boundaries.sort_by_key(|b| b.start_sequence);

        // Extend the covered range and adopt the edge flags of whichever
        // page now forms each edge.
        let extends_head = self
            .loaded_from
            .map_or(true, |from| pagination.from_sequence <= from);
        let extends_tail = self
            .loaded_to
            .map_or(true, |to| pagination.to_sequence >= to);
        if extends_head {
            self.loaded_from = Some(pagination.from_sequence);
            self.has_previous = pagination.has_previous;
        }
        if extends_tail {
            self.loaded_to = Some(pagination.to_sequence);
            self.has_more = pagination.has_more;
        }
        self.total_blocks = pagination.total_blocks;
    }

    /// All loaded blocks, ordered by sequence.
    pub fn blocks(&self) -> &[BlockView] {
        &self.blocks
    }

    /// Exercise starts across the loaded range, ordered by sequence.
    pub fn boundaries(&self) -> &[ExerciseBoundary] {
        &self.boundaries
    }

    /// Sequence range covered so far, when anything has loaded.
    pub fn loaded_range(&self) -> Option<(u64, u64)> {
        Some((self.loaded_from?, self.loaded_to?))
    }

    /// More covered material exists past the loaded tail.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Material exists before the loaded head.
    pub fn has_previous(&self) -> bool {
        self.has_previous
    }

    /// Total covered blocks, as reported by the most recent page.
    pub fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    /// Sequence to request next when scrolling forward.
    pub fn next_from(&self) -> Option<u64> {
        self.has_more.then(|| self.loaded_to.unwrap_or(0) + 1)
    }

    /// Sequence window to request next when scrolling backward: the page of
    /// `limit` blocks ending just before the loaded head.
    pub fn previous_window(&self, limit: u64) -> Option<(u64, u64)> {
        if !self.has_previous {
            return None;
        }
        let head = self.loaded_from?;
        let to = head.saturating_sub(1).max(1);
        let from = head.saturating_sub(limit).max(1);
        Some((from, to))
    }
}

// ============================================================================
// Tests
// ============================================================================
