//! Font size estimation from recognized glyph heights.

use crate::types::Token;

/// Running, character-weighted mean of token heights for one block.
///
/// Each token contributes its height once per character, so a single short token
/// with an anomalous height (a punctuation mark detected as tall) barely moves the
/// estimate of a long line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FontMetrics {
    height_sum: u64,
    char_count: u64,
}

impl FontMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a single token.
    pub fn from_token(token: &Token) -> Self {
        let mut metrics = Self::new();
        metrics.add(token);
        metrics
    }

    /// Account for a merged token. The separator space is not counted.
    pub fn add(&mut self, token: &Token) {
        let chars = token.char_count() as u64;
        self.height_sum += token.h as u64 * chars;
        self.char_count += chars;
    }

    pub fn char_count(&self) -> u64 {
        self.char_count
    }

    /// Estimated font size in pixels, never below 1.
    pub fn font_size_px(&self) -> u32 {
        let size = self.height_sum / self.char_count.max(1);
        size.clamp(1, u32::MAX as u64) as u32
    }
}
