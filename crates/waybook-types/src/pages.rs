//! Wire pages shared by the server routes and the client state machine.

use serde::{Deserialize, Serialize};

use crate::block::{BlockView, ExerciseBoundary};
use crate::ids::ResponseId;

/// Current-position delivery: everything up to the user's next block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookPage {
    pub blocks: Vec<BlockView>,
    /// Highest sequence the user has answered (0 = fresh start).
    pub progress: u64,
    /// True when published blocks exist beyond this page.
    pub has_more: bool,
}

/// Window metadata for a history page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub from_sequence: u64,
    /// Sequence of the last block actually returned.
    pub to_sequence: u64,
    /// True when answered blocks exist beyond this window.
    pub has_more: bool,
    /// True when the window does not start at the beginning.
    pub has_previous: bool,
    /// Count of blocks the user has reached (sequence <= progress).
    pub total_blocks: u64,
}

/// One window of already-covered material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub blocks: Vec<BlockView>,
    pub exercise_boundaries: Vec<ExerciseBoundary>,
    pub pagination: Pagination,
}

/// Acknowledgement of a saved response, carrying the next block so the
/// client can advance without a second round trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAck {
    pub id: ResponseId,
    /// True when an existing response was updated rather than created.
    pub updated: bool,
    pub new_progress: u64,
    pub next_block: Option<BlockView>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_wire_shape() {
        let page = HistoryPage {
            blocks: vec![],
            exercise_boundaries: vec![],
            pagination: Pagination {
                from_sequence: 1,
                to_sequence: 50,
                has_more: true,
                has_previous: false,
                total_blocks: 120,
            },
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["pagination"]["fromSequence"], 1);
        assert_eq!(json["pagination"]["toSequence"], 50);
        assert_eq!(json["pagination"]["hasMore"], true);
        assert_eq!(json["pagination"]["hasPrevious"], false);
        assert_eq!(json["exerciseBoundaries"], serde_json::json!([]));
    }

    #[test]
    fn test_save_ack_roundtrip() {
        let ack = SaveAck {
            id: ResponseId::new(),
            updated: false,
            new_progress: 12,
            next_block: None,
            has_more: true,
        };
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["newProgress"], 12);
        assert_eq!(json["nextBlock"], serde_json::Value::Null);
        let parsed: SaveAck = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, ack);
    }
}
