//! Merging curriculum blocks with a user's stored responses.
//!
//! The merge is a pure function over already-fetched rows: build two index
//! maps (prompt id → response, tool id → response), then attach response
//! text and id to matching blocks. Content blocks pass through untouched.

use std::collections::HashMap;

use tracing::warn;

use crate::config::EngineConfig;
use crate::pii::PiiCodec;
use waybook_types::{Block, BlockView, Response, ResponseId, SessionId};

/// Responses indexed by the content id they answer, with sensitive tool
/// responses already decrypted.
pub struct ResponseIndex {
    by_prompt: HashMap<i64, (ResponseId, String)>,
    by_tool: HashMap<i64, (ResponseId, String)>,
}

impl ResponseIndex {
    /// Index a user's responses for merging.
    ///
    /// Tool responses in the sensitive set pass through the PII codec here,
    /// once, rather than per block. A response that fails to decrypt is
    /// left out of the index entirely: the block renders unanswered, and
    /// ciphertext never reaches a client.
    pub fn build(
        responses: &[Response],
        cfg: &EngineConfig,
        pii: &dyn PiiCodec,
        session: SessionId,
    ) -> Self {
        let mut by_prompt = HashMap::new();
        let mut by_tool = HashMap::new();
        for resp in responses {
            if let Some(prompt_id) = resp.target.prompt_id() {
                by_prompt.insert(prompt_id, (resp.id, resp.response_text.clone()));
            } else if let Some(tool_id) = resp.target.tool_id() {
                let text = if cfg.sensitive_tool_ids.contains(&tool_id) {
                    match pii.decrypt(session, &resp.response_text) {
                        Some(text) => text,
                        None => {
                            warn!(response = %resp.id, tool_id, "dropping undecryptable response");
                            continue;
                        }
                    }
                } else {
                    resp.response_text.clone()
                };
                by_tool.insert(tool_id, (resp.id, text));
            }
        }
        Self { by_prompt, by_tool }
    }

    fn lookup(&self, block: &Block) -> Option<&(ResponseId, String)> {
        if let Some(prompt_id) = block.prompt_id() {
            self.by_prompt.get(&prompt_id)
        } else if let Some(tool_id) = block.tool_id() {
            self.by_tool.get(&tool_id)
        } else {
            None
        }
    }
}

/// Attach a user's response (if any) to one block.
pub fn merge_one(block: Block, index: &ResponseIndex) -> BlockView {
    match index.lookup(&block) {
        Some((id, text)) => BlockView {
            block,
            response: Some(text.clone()),
            response_id: Some(*id),
        },
        None => BlockView::unanswered(block),
    }
}

/// Attach responses to a run of blocks, preserving order.
pub fn merge(blocks: Vec<Block>, index: &ResponseIndex) -> Vec<BlockView> {
    blocks.into_iter().map(|b| merge_one(b, index)).collect()
}

/// Decrypt sensitive tool responses for direct listing.
///
/// Same failure posture as the index: a response that cannot be decrypted
/// is omitted, never returned as ciphertext.
pub fn decrypt_responses(
    responses: Vec<Response>,
    cfg: &EngineConfig,
    pii: &dyn PiiCodec,
    session: SessionId,
) -> Vec<Response> {
    responses
        .into_iter()
        .filter_map(|mut resp| {
            let sensitive = resp
                .target
                .tool_id()
                .is_some_and(|id| cfg.sensitive_tool_ids.contains(&id));
            if sensitive {
                match pii.decrypt(session, &resp.response_text) {
                    Some(text) => resp.response_text = text,
                    None => {
                        warn!(response = %resp.id, "dropping undecryptable response");
                        return None;
                    }
                }
            }
            Some(resp)
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
