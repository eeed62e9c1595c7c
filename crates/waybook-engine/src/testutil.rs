//! Fixture builders shared by the engine's unit tests.

use waybook_types::{Block, BlockContent, BlockKind, ContentBody, PromptBody, SessionId, ToolBody};

use crate::pii::PiiCodec;

/// Test codec: encrypt prefixes `enc:`, decrypt strips it or fails.
pub(crate) struct PrefixCodec;

impl PiiCodec for PrefixCodec {
    fn encrypt(&self, _session: SessionId, plaintext: &str) -> Option<String> {
        Some(format!("enc:{plaintext}"))
    }

    fn decrypt(&self, _session: SessionId, ciphertext: &str) -> Option<String> {
        ciphertext.strip_prefix("enc:").map(str::to_string)
    }
}

/// Test codec that refuses to encrypt anything.
pub(crate) struct FailingCodec;

impl PiiCodec for FailingCodec {
    fn encrypt(&self, _session: SessionId, _plaintext: &str) -> Option<String> {
        None
    }

    fn decrypt(&self, _session: SessionId, _ciphertext: &str) -> Option<String> {
        None
    }
}

pub(crate) fn content_block(seq: u64, ex: &str, id: i64, kind: &str, text: &str) -> Block {
    Block {
        id: seq as i64,
        sequence: seq,
        exercise: ex.parse().unwrap(),
        activity: 1,
        kind: BlockKind::Content,
        connection_id: None,
        content: BlockContent::Content(ContentBody {
            id,
            kind: kind.into(),
            text: text.into(),
        }),
    }
}

pub(crate) fn prompt_block(seq: u64, ex: &str, prompt_id: i64, text: &str) -> Block {
    Block {
        id: seq as i64,
        sequence: seq,
        exercise: ex.parse().unwrap(),
        activity: 1,
        kind: BlockKind::Prompt,
        connection_id: None,
        content: BlockContent::Prompt(PromptBody {
            id: prompt_id,
            prompt_text: text.into(),
            input_type: Some("textarea".into()),
            input_config: None,
        }),
    }
}

pub(crate) fn tool_block(seq: u64, ex: &str, tool_id: i64, name: &str) -> Block {
    Block {
        id: seq as i64,
        sequence: seq,
        exercise: ex.parse().unwrap(),
        activity: 1,
        kind: BlockKind::Tool,
        connection_id: None,
        content: BlockContent::Tool(ToolBody {
            id: tool_id,
            name: name.into(),
            description: None,
            instructions: None,
        }),
    }
}
