//! Stored user responses and their prompt-XOR-tool target rule.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exercise::ExerciseRef;
use crate::ids::{ResponseId, UserId};

/// Violation of the "exactly one of prompt_id / tool_id" rule.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTargetError {
    #[error("response must target a prompt or a tool")]
    Neither,
    #[error("response cannot target both a prompt and a tool")]
    Both,
}

/// What a response answers: exactly one prompt or one tool.
///
/// The storage schema keeps two nullable columns; this enum makes the XOR
/// constraint unrepresentable above the row level instead of re-checked at
/// every call site. Flattened into [`Response`] it serializes as a single
/// `promptId` or `toolId` field.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseTarget {
    #[serde(rename = "promptId")]
    Prompt(i64),
    #[serde(rename = "toolId")]
    Tool(i64),
}

impl ResponseTarget {
    /// Build from the two nullable wire/storage fields, enforcing XOR.
    pub fn from_parts(
        prompt_id: Option<i64>,
        tool_id: Option<i64>,
    ) -> Result<Self, ResponseTargetError> {
        match (prompt_id, tool_id) {
            (Some(p), None) => Ok(ResponseTarget::Prompt(p)),
            (None, Some(t)) => Ok(ResponseTarget::Tool(t)),
            (None, None) => Err(ResponseTargetError::Neither),
            (Some(_), Some(_)) => Err(ResponseTargetError::Both),
        }
    }

    pub fn prompt_id(&self) -> Option<i64> {
        match self {
            ResponseTarget::Prompt(id) => Some(*id),
            ResponseTarget::Tool(_) => None,
        }
    }

    pub fn tool_id(&self) -> Option<i64> {
        match self {
            ResponseTarget::Prompt(_) => None,
            ResponseTarget::Tool(id) => Some(*id),
        }
    }

    /// Check if this targets a tool (tool responses may carry sensitive data).
    pub fn is_tool(&self) -> bool {
        matches!(self, ResponseTarget::Tool(_))
    }
}

/// A saved answer: one user, one prompt-or-tool, one exercise position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: ResponseId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub target: ResponseTarget,
    pub exercise_id: ExerciseRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<i64>,
    pub response_text: String,
    /// Unix millis.
    pub created_at: u64,
    pub updated_at: u64,
}
