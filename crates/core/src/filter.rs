//! Token filtering and reading-order sort.

use crate::types::Token;

/// Tokens at or below this confidence are dropped.
pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 40;

/// Drops unreliable recognition results and puts the rest in reading order.
#[derive(Debug, Clone)]
pub struct TokenFilter {
    /// Minimum confidence (exclusive) a token needs to survive.
    threshold: u8,
}

impl Default for TokenFilter {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl TokenFilter {
    /// Create a filter with the given exclusive confidence threshold.
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Keep tokens with `confidence > threshold` and non-blank text, sorted by `(y, x)`.
    ///
    /// Kept tokens have their text trimmed. The sort is stable, so tokens sharing a
    /// position stay in input order. Top-to-bottom, left-to-right is only a proxy for
    /// reading order; right-to-left and vertical scripts are not modelled.
    pub fn apply(&self, tokens: impl IntoIterator<Item = Token>) -> Vec<Token> {
        let mut kept: Vec<Token> = tokens
            .into_iter()
            .filter(|t| t.confidence > self.threshold)
            .filter_map(|mut t| {
                let trimmed = t.text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                if trimmed.len() != t.text.len() {
                    t.text = trimmed.to_string();
                }
                Some(t)
            })
            .collect();

        kept.sort_by_key(|t| (t.y, t.x));
        kept
    }
}
