//! Workbook block model.
//!
//! A block is one row of the curriculum: a position in the global sequence
//! plus a typed content payload. `BlockKind` says what a block *is*; the
//! payload shape lives in [`BlockContent`], keyed off the kind when parsing
//! stored JSON.
//!
//! ## Design: BlockKind + BlockContent
//!
//! `BlockKind` is deliberately small — 3 variants. Everything else
//! (heading vs paragraph, input widget type, tool instructions) is payload
//! detail inside the content body, not a new kind.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::exercise::ExerciseRef;
use crate::ids::ResponseId;

/// What a block *is* (stored `block_type` column).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum BlockKind {
    /// Static reading material — never answered.
    #[default]
    Content,
    /// A question the user answers with typed input.
    Prompt,
    /// An interactive exercise tool; completion is recorded as a response.
    Tool,
}

impl BlockKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Content => "content",
            BlockKind::Prompt => "prompt",
            BlockKind::Tool => "tool",
        }
    }

    /// Check if this block records a user response (prompt or tool).
    pub fn is_answerable(&self) -> bool {
        matches!(self, BlockKind::Prompt | BlockKind::Tool)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of a content block (heading, paragraph, instruction, note, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBody {
    pub id: i64,
    /// Rendering hint: "heading", "paragraph", "instruction", "note", "quote".
    pub kind: String,
    pub text: String,
}

/// Payload of a prompt block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptBody {
    pub id: i64,
    pub prompt_text: String,
    /// Input widget: "text", "textarea", "select", ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Widget-specific configuration, passed through opaquely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_config: Option<serde_json::Value>,
}

/// Payload of a tool block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolBody {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<serde_json::Value>,
}

/// Typed content payload, keyed by [`BlockKind`] when read from storage.
///
/// Untagged on the wire: each variant has a distinguishing required field
/// (`promptText` / `name` / `text`), and `Missing` serializes as `{}`.
/// Malformed stored JSON parses to `Missing` — a curriculum authoring bug
/// must never take down a read path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockContent {
    Prompt(PromptBody),
    Tool(ToolBody),
    Content(ContentBody),
    Missing {},
}

impl BlockContent {
    /// Parse a stored `content_json` payload for a block of the given kind.
    ///
    /// The kind column is authoritative: a prompt row with tool-shaped JSON
    /// is malformed and degrades to `Missing`, it does not become a tool.
    pub fn from_json(kind: BlockKind, raw: &str) -> Self {
        match kind {
            BlockKind::Content => serde_json::from_str::<ContentBody>(raw)
                .map(BlockContent::Content)
                .unwrap_or(BlockContent::Missing {}),
            BlockKind::Prompt => serde_json::from_str::<PromptBody>(raw)
                .map(BlockContent::Prompt)
                .unwrap_or(BlockContent::Missing {}),
            BlockKind::Tool => serde_json::from_str::<ToolBody>(raw)
                .map(BlockContent::Tool)
                .unwrap_or(BlockContent::Missing {}),
        }
    }

    /// Content id of the payload (prompt id, tool id, or content id).
    pub fn content_id(&self) -> Option<i64> {
        match self {
            BlockContent::Prompt(p) => Some(p.id),
            BlockContent::Tool(t) => Some(t.id),
            BlockContent::Content(c) => Some(c.id),
            BlockContent::Missing {} => None,
        }
    }

    /// Text of a heading content payload, if that's what this is.
    pub fn heading_text(&self) -> Option<&str> {
        match self {
            BlockContent::Content(c) if c.kind == "heading" => Some(&c.text),
            _ => None,
        }
    }
}

/// One curriculum block at its global sequence position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Curriculum row id.
    pub id: i64,
    /// Global position, strictly increasing and gapless across the workbook.
    pub sequence: u64,
    /// The `part.module.exercise` this block belongs to.
    pub exercise: ExerciseRef,
    /// Activity within the exercise.
    pub activity: i64,
    #[serde(rename = "blockType")]
    pub kind: BlockKind,
    /// Connection to auto-populated data, when the block has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<i64>,
    pub content: BlockContent,
}

impl Block {
    /// Prompt content id, when this is a prompt block.
    pub fn prompt_id(&self) -> Option<i64> {
        match &self.content {
            BlockContent::Prompt(p) => Some(p.id),
            _ => None,
        }
    }

    /// Tool content id, when this is a tool block.
    pub fn tool_id(&self) -> Option<i64> {
        match &self.content {
            BlockContent::Tool(t) => Some(t.id),
            _ => None,
        }
    }
}

/// A block as delivered to clients: the block plus the user's response, if any.
///
/// Content blocks always carry `response: None`; prompt and tool blocks carry
/// the saved response text after merging.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockView {
    #[serde(flatten)]
    pub block: Block,
    pub response: Option<String>,
    pub response_id: Option<ResponseId>,
}

impl BlockView {
    /// Wrap a block with no response attached.
    pub fn unanswered(block: Block) -> Self {
        Self {
            block,
            response: None,
            response_id: None,
        }
    }

    /// Check if this block needs user input to advance past it.
    pub fn requires_input(&self) -> bool {
        self.block.kind.is_answerable() && self.response.is_none()
    }
}

/// Start of an exercise within a delivered window, for sidebar navigation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseBoundary {
    pub exercise_id: ExerciseRef,
    pub start_sequence: u64,
    pub title: String,
}

// ============================================================================
// Tests
// ============================================================================
