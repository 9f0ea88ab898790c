//! Usage accounting for model invocations.
//!
//! The client never owns usage totals. Each successful call produces a
//! [`UsageDelta`] that is merged into a caller-owned [`UsageSink`], usually the
//! metadata record of the document block the extraction was performed for.
//! Failed calls record nothing.

use serde::{Deserialize, Serialize};

/// Counts contributed by one or more model invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDelta {
    pub request_count: u64,
    pub tokens_used: u64,
}

impl UsageDelta {
    /// Delta for a single successful request.
    pub fn single_request(tokens_used: u64) -> Self {
        Self {
            request_count: 1,
            tokens_used,
        }
    }
}

/// Anything that can absorb usage deltas additively.
///
/// Implementations must only accumulate: the client never resets or reads the
/// sink. Thread safety is the implementor's concern; the client takes
/// `&mut self` for the duration of one merge.
pub trait UsageSink {
    fn record_usage(&mut self, delta: UsageDelta);
}

/// Per-block usage metadata, accumulated across every extraction performed on
/// behalf of the block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockUsage {
    pub llm_request_count: u64,
    pub llm_tokens_used: u64,
}

impl UsageSink for BlockUsage {
    fn record_usage(&mut self, delta: UsageDelta) {
        self.llm_request_count = self.llm_request_count.saturating_add(delta.request_count);
        self.llm_tokens_used = self.llm_tokens_used.saturating_add(delta.tokens_used);
    }
}

impl UsageSink for UsageDelta {
    fn record_usage(&mut self, delta: UsageDelta) {
        self.request_count = self.request_count.saturating_add(delta.request_count);
        self.tokens_used = self.tokens_used.saturating_add(delta.tokens_used);
    }
}
