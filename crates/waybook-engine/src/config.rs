//! Engine tunables.

use std::collections::HashSet;

/// Deployment knobs for progression and delivery.
///
/// Everything here is policy, not semantics: changing a value moves a
/// boundary (publication edge, look-ahead, page size) without changing how
/// progress or merging work.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Highest part of the curriculum that is published. Blocks in later
    /// parts exist in storage but are never delivered.
    pub published_max_part: u32,
    /// How far past their progress a user may page ahead in history.
    /// Uniform; it does not scale with exercise length.
    pub ahead_allowance: u64,
    /// History page size when the request names none.
    pub default_page_limit: u64,
    /// Hard cap on history page size.
    pub max_page_limit: u64,
    /// Tool content ids whose responses hold personal data and must pass
    /// through the PII codec on every write and read.
    pub sensitive_tool_ids: HashSet<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            published_max_part: 2,
            ahead_allowance: 10,
            default_page_limit: 50,
            max_page_limit: 100,
            sensitive_tool_ids: HashSet::new(),
        }
    }
}

impl EngineConfig {
    /// Clamp a requested history page limit into `[1, max_page_limit]`,
    /// defaulting when absent.
    pub fn clamp_limit(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_page_limit)
            .clamp(1, self.max_page_limit)
    }
}
