//! Client-side progression logic, independent of any UI framework.
//!
//! A [`ProgressionMachine`] owns the blocks of one delivered workbook window
//! and decides what the user sees next, when drafts are persisted, and when
//! the view advances. It is a pure state machine: callers feed it [`Event`]s
//! (user input, timer expiry, save outcomes) and execute the [`Effect`]s it
//! returns. Timers are generation-counted so a cancelled or superseded timer
//! that still fires is ignored.
//!
//! # State Machine
//!
//! ```text
//! +-----------------+
//! | AwaitingReveal  |  current block is animating in
//! +--------+--------+
//!          | RevealFinished
//!          v
//!   content? -> AwaitingContinue -------- Continue -------> next block
//!   prompt?  -> AwaitingPromptInput -- Submit + settle ----> next block
//!   tool?    -> AwaitingToolCompletion - ToolCompleted -+--> next block
//!                                          (+ settle)
//!          ...
//!          | past the last block
//!          v
//! +------------------+
//! | ExerciseComplete |
//! +------------------+
//! ```
//!
//! While in `AwaitingPromptInput`, keystrokes schedule a debounced autosave;
//! an explicit submit cancels the pending autosave, persists once, and
//! advances after a short settle delay. Editing an already-answered block
//! (`BeginEdit`) reuses the same input flow but never re-advances.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tracing::{debug, warn};
use waybook_types::{BlockKind, BlockView, ResponseTarget};

use crate::save::{SaveCommand, SaveKind, SaveResult};

/// Idle time after the last keystroke before a draft is autosaved.
pub const AUTO_SAVE_DELAY: Duration = Duration::from_millis(1500);

/// Pause between a submit landing and the next block being revealed, so the
/// answer visibly settles before the view moves.
pub const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Where the machine is within the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The current block is animating in.
    AwaitingReveal,
    /// A content block is shown; waiting for the user to continue.
    AwaitingContinue,
    /// A prompt block is shown; waiting for text input and submit.
    AwaitingPromptInput,
    /// A tool block is shown; waiting for the embedded tool to finish.
    AwaitingToolCompletion,
    /// Every block in the window has been worked through.
    ExerciseComplete,
}

/// Input to the machine: user actions, timer expiries, save outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The reveal animation for a block finished (or was skipped).
    RevealFinished { block_id: i64, skipped: bool },
    /// The user advanced past a content block.
    Continue,
    /// The prompt draft changed to this value.
    InputChanged { value: String },
    /// A previously scheduled autosave timer fired.
    DebounceFired { generation: u64 },
    /// The user explicitly submitted the current draft.
    Submit,
    /// A previously scheduled settle timer fired.
    SettleElapsed { generation: u64 },
    /// The embedded tool produced its result text.
    ToolCompleted { text: String },
    /// A save command completed, matched by ticket.
    SaveResolved { ticket: u64, result: SaveResult },
    /// The user started revising an already-answered block.
    BeginEdit { block_id: i64 },
    /// The view is being torn down; cancel all pending work.
    Teardown,
}

/// Output of the machine, executed by the embedding client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Arm the autosave timer; deliver `DebounceFired` with this generation.
    ScheduleDebounce { generation: u64, delay: Duration },
    /// Arm the settle timer; deliver `SettleElapsed` with this generation.
    ScheduleSettle { generation: u64, delay: Duration },
    /// Persist a response (see [`SaveCommand::is_update`] for the route).
    Save(SaveCommand),
    /// Abort in-flight save requests that have not resolved yet.
    CancelPendingSaves,
}

/// Progression state for one delivered window of blocks.
///
/// Blocks must be ordered by sequence, as delivered by the server.
#[derive(Debug, Clone)]
pub struct ProgressionMachine {
    blocks: Vec<BlockView>,
    /// Index of the block currently in play. `blocks.len()` when complete.
    cursor: usize,
    phase: Phase,
    /// Ids of blocks that have been revealed. Append-only.
    seen: BTreeSet<i64>,
    draft: String,
    /// Last draft value handed to a save command. Suppresses redundant writes.
    last_saved: Option<String>,
    debounce_generation: u64,
    settle_generation: u64,
    next_ticket: u64,
    /// Outstanding save tickets and the block index each one targets.
    in_flight: HashMap<u64, usize>,
    /// Block index being revised, when the input flow was entered via edit.
    editing: Option<usize>,
    torn_down: bool,
}

impl ProgressionMachine {
    /// Build a machine resumed at the first unanswered prompt or tool block.
    ///
    /// Blocks before the resume point count as already seen; a window with no
    /// unanswered block starts complete.
    pub fn new(blocks: Vec<BlockView>) -> Self {
        let cursor = resume_index(&blocks);
        let seen = blocks[..cursor].iter().map(|b| b.block.id).collect();
        let phase = if cursor >= blocks.len() {
            Phase::ExerciseComplete
        } else {
            Phase::AwaitingReveal
        };
        Self {
            blocks,
            cursor,
            phase,
            seen,
            draft: String::new(),
            last_saved: None,
            debounce_generation: 0,
            settle_generation: 0,
            next_ticket: 0,
            in_flight: HashMap::new(),
            editing: None,
            torn_down: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The block currently in play, unless the window is complete.
    pub fn current_block(&self) -> Option<&BlockView> {
        self.blocks.get(self.cursor)
    }

    /// Blocks revealed so far plus the one in play, in order.
    pub fn visible_blocks(&self) -> &[BlockView] {
        let end = (self.cursor + 1).min(self.blocks.len());
        &self.blocks[..end]
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::ExerciseComplete
    }

    pub fn has_seen(&self, block_id: i64) -> bool {
        self.seen.contains(&block_id)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    /// Append a freshly delivered block, e.g. the `next_block` of a save
    /// acknowledgement. Out-of-order or duplicate deliveries are ignored. A
    /// machine that had run out of blocks picks the new one up as the block
    /// in play.
    pub fn push_block(&mut self, view: BlockView) -> bool {
        let last = self.blocks.last().map(|b| b.block.sequence);
        if last.is_some_and(|seq| view.block.sequence <= seq) {
            return false;
        }
        self.blocks.push(view);
        if self.phase == Phase::ExerciseComplete {
            self.phase = Phase::AwaitingReveal;
        }
        true
    }

    /// Apply one event and return the effects to execute.
    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        if self.torn_down {
            // Late timers and resolutions after teardown are expected; drop them.
            debug!(?event, "event after teardown ignored");
            return Vec::new();
        }
        match event {
            Event::RevealFinished { block_id, skipped } => {
                self.on_reveal_finished(block_id, skipped)
            }
            Event::Continue => self.on_continue(),
            Event::InputChanged { value } => self.on_input_changed(value),
            Event::DebounceFired { generation } => self.on_debounce_fired(generation),
            Event::Submit => self.on_submit(),
            Event::SettleElapsed { generation } => self.on_settle_elapsed(generation),
            Event::ToolCompleted { text } => self.on_tool_completed(text),
            Event::SaveResolved { ticket, result } => self.on_save_resolved(ticket, result),
            Event::BeginEdit { block_id } => self.on_begin_edit(block_id),
            Event::Teardown => self.on_teardown(),
        }
    }

    // ========================================================================
    // Event handlers
    // ========================================================================

    fn on_reveal_finished(&mut self, block_id: i64, skipped: bool) -> Vec<Effect> {
        if self.phase != Phase::AwaitingReveal {
            return Vec::new();
        }
        let Some(current) = self.blocks.get(self.cursor) else {
            return Vec::new();
        };
        if current.block.id != block_id {
            debug!(block_id, "reveal for a block that is not in play");
            return Vec::new();
        }
        let kind = current.block.kind;
        let answered = current.response.is_some();
        self.seen.insert(block_id);
        if skipped {
            debug!(block_id, "reveal skipped");
        }
        // A prompt or tool that already carries an answer is inert history,
        // never a live input.
        if kind.is_answerable() && answered {
            self.advance();
            return Vec::new();
        }
        self.phase = match kind {
            BlockKind::Content => Phase::AwaitingContinue,
            BlockKind::Prompt => Phase::AwaitingPromptInput,
            BlockKind::Tool => Phase::AwaitingToolCompletion,
        };
        Vec::new()
    }

    fn on_continue(&mut self) -> Vec<Effect> {
        if self.phase != Phase::AwaitingContinue {
            return Vec::new();
        }
        self.advance();
        Vec::new()
    }

    fn on_input_changed(&mut self, value: String) -> Vec<Effect> {
        if self.phase != Phase::AwaitingPromptInput {
            return Vec::new();
        }
        self.draft = value;
        self.debounce_generation += 1;
        vec![Effect::ScheduleDebounce {
            generation: self.debounce_generation,
            delay: AUTO_SAVE_DELAY,
        }]
    }

    fn on_debounce_fired(&mut self, generation: u64) -> Vec<Effect> {
        if generation != self.debounce_generation {
            return Vec::new(); // superseded by later input or a submit
        }
        if self.phase != Phase::AwaitingPromptInput || self.draft.is_empty() {
            return Vec::new();
        }
        if self.last_saved.as_deref() == Some(self.draft.as_str()) {
            return Vec::new();
        }
        match self.issue_save(SaveKind::Autosave) {
            Some(effect) => vec![effect],
            None => Vec::new(),
        }
    }

    fn on_submit(&mut self) -> Vec<Effect> {
        if self.phase != Phase::AwaitingPromptInput || self.draft.is_empty() {
            return Vec::new();
        }
        // Kill any armed autosave; the submit supersedes it.
        self.debounce_generation += 1;
        let mut effects = vec![Effect::CancelPendingSaves];

        if self.last_saved.as_deref() != Some(self.draft.as_str()) {
            let kind = if self.editing.is_some() {
                SaveKind::Edit
            } else {
                SaveKind::Submit
            };
            if let Some(effect) = self.issue_save(kind) {
                effects.push(effect);
            }
        }

        self.settle_generation += 1;
        effects.push(Effect::ScheduleSettle {
            generation: self.settle_generation,
            delay: SETTLE_DELAY,
        });
        effects
    }

    fn on_settle_elapsed(&mut self, generation: u64) -> Vec<Effect> {
        if generation != self.settle_generation {
            return Vec::new();
        }
        // Consume the generation: a duplicate delivery must not fire twice.
        self.settle_generation += 1;
        if let Some(index) = self.editing.take() {
            // Editing an answered block settles back in place.
            self.blocks[index].response = Some(self.draft.clone());
            self.restore_phase();
            return Vec::new();
        }
        match self.phase {
            Phase::AwaitingPromptInput | Phase::AwaitingToolCompletion => {
                self.blocks[self.cursor].response = Some(self.draft.clone());
                self.advance();
            }
            _ => {}
        }
        Vec::new()
    }

    fn on_tool_completed(&mut self, text: String) -> Vec<Effect> {
        if self.phase != Phase::AwaitingToolCompletion {
            return Vec::new();
        }
        self.draft = text;
        let mut effects = Vec::new();
        if let Some(effect) = self.issue_save(SaveKind::Submit) {
            effects.push(effect);
        }
        self.settle_generation += 1;
        effects.push(Effect::ScheduleSettle {
            generation: self.settle_generation,
            delay: SETTLE_DELAY,
        });
        effects
    }

    fn on_save_resolved(&mut self, ticket: u64, result: SaveResult) -> Vec<Effect> {
        let Some(index) = self.in_flight.remove(&ticket) else {
            debug!(ticket, "resolution for an unknown save ticket");
            return Vec::new();
        };
        if let Err(e) = result {
            // Clear the dedup marker so the next debounce or submit retries.
            warn!(ticket, block = self.blocks[index].block.id, error = %e, "save failed");
            self.last_saved = None;
        }
        Vec::new()
    }

    fn on_begin_edit(&mut self, block_id: i64) -> Vec<Effect> {
        if self.editing.is_some() {
            return Vec::new();
        }
        let Some(index) = self.blocks.iter().position(|b| b.block.id == block_id) else {
            return Vec::new();
        };
        let view = &self.blocks[index];
        if !view.block.kind.is_answerable() || view.response.is_none() {
            return Vec::new();
        }
        let existing = view.response.clone().unwrap_or_default();
        self.editing = Some(index);
        self.draft = existing.clone();
        // An unchanged draft must not generate a write.
        self.last_saved = Some(existing);
        self.phase = Phase::AwaitingPromptInput;
        Vec::new()
    }

    fn on_teardown(&mut self) -> Vec<Effect> {
        self.torn_down = true;
        self.debounce_generation += 1;
        self.settle_generation += 1;
        vec![Effect::CancelPendingSaves]
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Move past the current block and reset per-block input state.
    ///
    /// Prompts and tools answered out of band (an earlier session, another
    /// window) are counted as seen and stepped over, the same way
    /// construction resumes past them.
    fn advance(&mut self) {
        self.cursor += 1;
        self.draft.clear();
        self.last_saved = None;
        while let Some(view) = self.blocks.get(self.cursor) {
            if !view.block.kind.is_answerable() || view.response.is_none() {
                break;
            }
            self.seen.insert(view.block.id);
            self.cursor += 1;
        }
        self.phase = if self.cursor >= self.blocks.len() {
            Phase::ExerciseComplete
        } else {
            Phase::AwaitingReveal
        };
    }

    /// Phase for the block at the cursor, after an edit ends.
    fn restore_phase(&mut self) {
        let Some(current) = self.blocks.get(self.cursor) else {
            self.phase = Phase::ExerciseComplete;
            return;
        };
        self.draft.clear();
        self.last_saved = None;
        self.phase = if !self.seen.contains(&current.block.id) {
            Phase::AwaitingReveal
        } else {
            match current.block.kind {
                BlockKind::Content => Phase::AwaitingContinue,
                BlockKind::Prompt => Phase::AwaitingPromptInput,
                BlockKind::Tool => Phase::AwaitingToolCompletion,
            }
        };
    }

    /// Emit a save command for the draft against the given block, tracking
    /// the ticket so the resolution can be matched later.
    fn issue_save(&mut self, kind: SaveKind) -> Option<Effect> {
        let index = self.editing.unwrap_or(self.cursor);
        let view = self.blocks.get(index)?;
        let target = match view.block.kind {
            BlockKind::Prompt => ResponseTarget::Prompt(view.block.prompt_id()?),
            BlockKind::Tool => ResponseTarget::Tool(view.block.tool_id()?),
            BlockKind::Content => return None,
        };
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.in_flight.insert(ticket, index);
        self.last_saved = Some(self.draft.clone());
        Some(Effect::Save(SaveCommand {
            ticket,
            kind,
            target,
            exercise: view.block.exercise,
            activity_id: Some(view.block.activity),
            text: self.draft.clone(),
        }))
    }
}

/// Index of the first unanswered prompt or tool block, or `blocks.len()`
/// when everything answerable is already answered.
fn resume_index(blocks: &[BlockView]) -> usize {
    blocks
        .iter()
        .position(|b| b.requires_input())
        .unwrap_or(blocks.len())
}

// ============================================================================
// Tests
// ============================================================================
