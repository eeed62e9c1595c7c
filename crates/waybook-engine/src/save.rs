//! Saving responses: validated upserts plus the advance payload.
//!
//! A save answers exactly one prompt or tool at one exercise position. The
//! write is an upsert on `(user, content id, exercise, activity)`, so
//! duplicate submits are idempotent — last write wins, no second row. The
//! acknowledgement carries the next block so a client can advance without
//! another round trip.

use tracing::debug;

use crate::config::EngineConfig;
use crate::db::WorkbookDb;
use crate::error::{EngineError, Result};
use crate::pii::PiiCodec;
use waybook_types::{
    BlockKind, BlockView, ExerciseRef, ResponseTarget, SaveAck, SessionId, UserId,
};

/// A validated save request.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub target: ResponseTarget,
    pub exercise: ExerciseRef,
    pub activity_id: Option<i64>,
    pub text: String,
}

/// Upsert a response and report where that leaves the user.
///
/// With `require_existing` (PUT semantics) a missing row is
/// [`EngineError::ResponseNotFound`] instead of an insert.
pub fn save_response(
    db: &WorkbookDb,
    cfg: &EngineConfig,
    pii: &dyn PiiCodec,
    session: SessionId,
    user: UserId,
    req: &SaveRequest,
    require_existing: bool,
) -> Result<SaveAck> {
    let stored_text = protect_text(cfg, pii, session, req)?;

    let existing = db.find_response_id(user, req.target, req.exercise, req.activity_id)?;
    let (id, updated) = match existing {
        Some(id) => {
            db.update_response(id, &stored_text)?;
            (id, true)
        }
        None if require_existing => return Err(EngineError::ResponseNotFound),
        None => {
            let id = db.insert_response(
                user,
                req.target,
                req.exercise,
                req.activity_id,
                &stored_text,
            )?;
            (id, false)
        }
    };

    let total = db.max_sequence(cfg.published_max_part)?;
    let answered = db.find_block(
        target_kind(req.target),
        content_id(req.target),
        req.exercise,
        req.activity_id,
    )?;

    let ack = match answered {
        Some(block) => {
            let next_seq = block.sequence + 1;
            let next_block = if next_seq <= total {
                db.block_at(next_seq, cfg.published_max_part)?
                    .map(BlockView::unanswered)
            } else {
                None
            };
            SaveAck {
                id,
                updated,
                new_progress: block.sequence,
                next_block,
                has_more: next_seq < total,
            }
        }
        // No curriculum block matches the target: the response is kept but
        // grants no position. Progress stays whatever the join derives.
        None => {
            let progress = db.compute_progress(user)?;
            SaveAck {
                id,
                updated,
                new_progress: progress,
                next_block: None,
                has_more: progress < total,
            }
        }
    };
    debug!(%user, response = %id, updated, progress = ack.new_progress, "saved response");
    Ok(ack)
}

/// Encrypt the text when the target tool is in the sensitive set.
/// Encryption failure rejects the save; plaintext never reaches storage.
fn protect_text(
    cfg: &EngineConfig,
    pii: &dyn PiiCodec,
    session: SessionId,
    req: &SaveRequest,
) -> Result<String> {
    let sensitive = req
        .target
        .tool_id()
        .is_some_and(|id| cfg.sensitive_tool_ids.contains(&id));
    if sensitive {
        pii.encrypt(session, &req.text)
            .ok_or(EngineError::EncryptFailed)
    } else {
        Ok(req.text.clone())
    }
}

fn target_kind(target: ResponseTarget) -> BlockKind {
    match target {
        ResponseTarget::Prompt(_) => BlockKind::Prompt,
        ResponseTarget::Tool(_) => BlockKind::Tool,
    }
}

fn content_id(target: ResponseTarget) -> i64 {
    match target {
        ResponseTarget::Prompt(id) | ResponseTarget::Tool(id) => id,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{content_block, prompt_block, tool_block, FailingCodec, PrefixCodec};

    fn seeded_db() -> WorkbookDb {
        let db = WorkbookDb::in_memory().unwrap();
        db.insert_block(&content_block(1, "1.1.1", 101, "heading", "Welcome"))
            .unwrap();
        db.insert_block(&content_block(2, "1.1.1", 102, "paragraph", "Read."))
            .unwrap();
        db.insert_block(&prompt_block(3, "1.1.1", 11, "What energizes you?"))
            .unwrap();
        db.insert_block(&prompt_block(4, "1.1.2", 12, "And why?")).unwrap();
        db.insert_block(&tool_block(5, "1.1.2", 21, "journal")).unwrap();
        db
    }

    fn prompt_save(text: &str) -> SaveRequest {
        SaveRequest {
            target: ResponseTarget::Prompt(11),
            exercise: "1.1.1".parse().unwrap(),
            activity_id: None,
            text: text.into(),
        }
    }

    #[test]
    fn test_answer_advances_past_answered_block() {
        let db = seeded_db();
        let cfg = EngineConfig::default();
        let user = UserId::new();
        let session = SessionId::new();

        let ack =
            save_response(&db, &cfg, &PrefixCodec, session, user, &prompt_save("dancing"), false)
                .unwrap();
        assert!(!ack.updated);
        assert_eq!(ack.new_progress, 3);
        let next = ack.next_block.unwrap();
        assert_eq!(next.block.sequence, 4);
        assert_eq!(next.response, None);
        assert!(ack.has_more); // block 5 exists beyond the next one

        assert_eq!(db.compute_progress(user).unwrap(), 3);
    }

    #[test]
    fn test_edit_updates_without_moving_progress() {
        let db = seeded_db();
        let cfg = EngineConfig::default();
        let user = UserId::new();
        let session = SessionId::new();

        let first =
            save_response(&db, &cfg, &PrefixCodec, session, user, &prompt_save("v1"), false)
                .unwrap();
        let progress_before = db.compute_progress(user).unwrap();

        let second =
            save_response(&db, &cfg, &PrefixCodec, session, user, &prompt_save("v2"), true)
                .unwrap();
        assert!(second.updated);
        assert_eq!(second.id, first.id);
        assert_eq!(db.compute_progress(user).unwrap(), progress_before);

        let stored = db.list_responses(user, None).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].response_text, "v2");
    }

    #[test]
    fn test_put_without_existing_response_is_not_found() {
        let db = seeded_db();
        let user = UserId::new();
        let result = save_response(
            &db,
            &EngineConfig::default(),
            &PrefixCodec,
            SessionId::new(),
            user,
            &prompt_save("x"),
            true,
        );
        assert!(matches!(result, Err(EngineError::ResponseNotFound)));
        assert!(db.list_responses(user, None).unwrap().is_empty());
    }

    #[test]
    fn test_last_block_answer_has_no_next() {
        let db = seeded_db();
        let cfg = EngineConfig::default();
        let user = UserId::new();
        let req = SaveRequest {
            target: ResponseTarget::Tool(21),
            exercise: "1.1.2".parse().unwrap(),
            activity_id: None,
            text: "done".into(),
        };
        let ack =
            save_response(&db, &cfg, &PrefixCodec, SessionId::new(), user, &req, false).unwrap();
        assert_eq!(ack.new_progress, 5);
        assert!(ack.next_block.is_none());
        assert!(!ack.has_more);
    }

    #[test]
    fn test_sensitive_tool_text_stored_encrypted() {
        let db = seeded_db();
        let mut cfg = EngineConfig::default();
        cfg.sensitive_tool_ids.insert(21);
        let user = UserId::new();
        let req = SaveRequest {
            target: ResponseTarget::Tool(21),
            exercise: "1.1.2".parse().unwrap(),
            activity_id: None,
            text: "my private notes".into(),
        };
        save_response(&db, &cfg, &PrefixCodec, SessionId::new(), user, &req, false).unwrap();

        let stored = db.list_responses(user, None).unwrap();
        assert_eq!(stored[0].response_text, "enc:my private notes");
    }

    #[test]
    fn test_encrypt_failure_rejects_save() {
        let db = seeded_db();
        let mut cfg = EngineConfig::default();
        cfg.sensitive_tool_ids.insert(21);
        let user = UserId::new();
        let req = SaveRequest {
            target: ResponseTarget::Tool(21),
            exercise: "1.1.2".parse().unwrap(),
            activity_id: None,
            text: "my private notes".into(),
        };
        let result =
            save_response(&db, &cfg, &FailingCodec, SessionId::new(), user, &req, false);
        assert!(matches!(result, Err(EngineError::EncryptFailed)));
        // Nothing stored — neither plaintext nor a placeholder row.
        assert!(db.list_responses(user, None).unwrap().is_empty());
    }

    #[test]
    fn test_response_without_matching_block_keeps_derived_progress() {
        let db = seeded_db();
        let cfg = EngineConfig::default();
        let user = UserId::new();
        let req = SaveRequest {
            target: ResponseTarget::Prompt(999),
            exercise: "1.1.1".parse().unwrap(),
            activity_id: None,
            text: "orphan".into(),
        };
        let ack =
            save_response(&db, &cfg, &PrefixCodec, SessionId::new(), user, &req, false).unwrap();
        assert_eq!(ack.new_progress, 0);
        assert!(ack.next_block.is_none());
        assert!(ack.has_more);
    }
}
