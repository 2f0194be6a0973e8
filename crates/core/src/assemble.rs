//! Adaptive block assembly.
//!
//! Tokens are folded, in reading order, into one in-progress block at a time. A
//! token joins the current block when it sits on the same line and close enough
//! horizontally, where both tolerances are multiples of the current block height.
//! Scaling the thresholds with the locally observed glyph height lets the same
//! rules work for titles and footnotes, at any scan resolution.
//!
//! Decisions are made once and never revisited. A token whose real neighbour
//! sorts later (y jitter across a sort boundary) can end up in the wrong block.

use serde::{Deserialize, Serialize};

use crate::filter::TokenFilter;
use crate::font::FontMetrics;
use crate::normalize::normalize_block_text;
use crate::types::{TextBlock, Token};

/// Default vertical tolerance, as a fraction of the current block height.
pub const DEFAULT_LINE_RATIO: f64 = 0.8;

/// Default horizontal gap tolerance, as a multiple of the current block height.
pub const DEFAULT_GAP_RATIO: f64 = 2.5;

/// Merge tolerances, both relative to the current block height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssemblyParams {
    /// `|next.y - block.y|` must stay below `block.h * line_ratio`.
    pub line_ratio: f64,

    /// `next.x - block.right` must stay below `block.h * gap_ratio`.
    /// Failing this marks a column break.
    pub gap_ratio: f64,
}

impl Default for AssemblyParams {
    fn default() -> Self {
        Self {
            line_ratio: DEFAULT_LINE_RATIO,
            gap_ratio: DEFAULT_GAP_RATIO,
        }
    }
}

/// Groups reading-ordered tokens into text blocks.
#[derive(Debug, Clone, Default)]
pub struct BlockAssembler {
    params: AssemblyParams,
}

impl BlockAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: AssemblyParams) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> AssemblyParams {
        self.params
    }

    /// Assemble tokens that are already filtered and sorted by `(y, x)`.
    ///
    /// Every token ends up in exactly one block. Empty input gives no blocks.
    pub fn assemble(&self, tokens: &[Token]) -> Vec<TextBlock> {
        let mut tokens = tokens.iter();
        let Some(first) = tokens.next() else {
            return Vec::new();
        };

        let mut blocks = Vec::new();
        let mut current = Accumulator::start(first);

        for token in tokens {
            if current.accepts(token, &self.params) {
                current.absorb(token);
            } else {
                blocks.push(current.finish());
                current = Accumulator::start(token);
            }
        }
        blocks.push(current.finish());

        log::debug!(
            "Assembled {} tokens into {} blocks",
            blocks.iter().map(|b| b.token_count).sum::<usize>(),
            blocks.len()
        );

        blocks
    }
}

/// Filter, sort and assemble one page of recognition output with default settings.
pub fn assemble_blocks(tokens: impl IntoIterator<Item = Token>) -> Vec<TextBlock> {
    let sorted = TokenFilter::default().apply(tokens);
    BlockAssembler::new().assemble(&sorted)
}

/// The in-progress block.
#[derive(Debug)]
struct Accumulator {
    text: String,
    x: i64,
    y: i64,
    w: i64,
    h: i64,
    font: FontMetrics,
    confidence_sum: u64,
    token_count: usize,
}

impl Accumulator {
    fn start(token: &Token) -> Self {
        Self {
            text: token.text.clone(),
            x: token.x as i64,
            y: token.y as i64,
            w: token.w as i64,
            h: token.h as i64,
            font: FontMetrics::from_token(token),
            confidence_sum: token.confidence as u64,
            token_count: 1,
        }
    }

    fn accepts(&self, token: &Token, params: &AssemblyParams) -> bool {
        let v_gap = (token.y as i64 - self.y).abs();
        let h_gap = token.x as i64 - (self.x + self.w);
        let scale = self.h as f64;

        let is_same_line = (v_gap as f64) < scale * params.line_ratio;
        let is_near_horizontal = (h_gap as f64) < scale * params.gap_ratio;

        is_same_line && is_near_horizontal
    }

    fn absorb(&mut self, token: &Token) {
        self.text.push(' ');
        self.text.push_str(&token.text);

        // The right edge follows the last merged token, even when that token starts
        // left of the block. Clamped so the width never goes negative.
        self.w = (token.x as i64 + token.w as i64 - self.x).max(0);
        self.h = self.h.max(token.h as i64);

        self.font.add(token);
        self.confidence_sum += token.confidence as u64;
        self.token_count += 1;
    }

    fn finish(self) -> TextBlock {
        TextBlock {
            text: normalize_block_text(&self.text),
            x: self.x as u32,
            y: self.y as u32,
            w: self.w.min(u32::MAX as i64) as u32,
            h: self.h as u32,
            font_size_px: self.font.font_size_px(),
            confidence: self.confidence_sum as f32 / self.token_count as f32,
            token_count: self.token_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str, x: i64, y: i64, w: i64, h: i64) -> Token {
        Token::new(text, 90, x, y, w, h).unwrap()
    }

    #[test]
    fn test_cjk_tokens_merge_without_space() {
        let blocks = assemble_blocks(vec![
            token("私", 40, 100, 30, 20),
            token("は", 72, 100, 28, 20),
        ]);

        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.text, "私は");
        assert_eq!((block.x, block.y, block.w, block.h), (40, 100, 60, 20));
        assert_eq!(block.token_count, 2);
    }

    #[test]
    fn test_wide_gap_starts_new_column() {
        // h_gap = 150, threshold = 20 * 2.5 = 50
        let blocks = assemble_blocks(vec![
            token("Hello", 0, 0, 50, 20),
            token("World", 200, 0, 50, 20),
        ]);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "Hello");
        assert_eq!(blocks[1].text, "World");
        assert_eq!(blocks[1].x, 200);
    }

    #[test]
    fn test_empty_input() {
        assert!(assemble_blocks(Vec::new()).is_empty());
        assert!(BlockAssembler::new().assemble(&[]).is_empty());
    }

    #[test]
    fn test_single_token() {
        let blocks = assemble_blocks(vec![token("alone", 3, 4, 30, 12)]);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "alone");
        assert_eq!(blocks[0].token_count, 1);
        assert_eq!(blocks[0].font_size_px, 12);
    }

    #[test]
    fn test_latin_words_keep_separator() {
        let blocks = assemble_blocks(vec![
            token("Hello", 0, 0, 50, 20),
            token("World", 60, 2, 50, 20),
        ]);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Hello World");
        assert_eq!(blocks[0].w, 110);
    }

    #[test]
    fn test_new_line_starts_new_block() {
        // v_gap = 30, threshold = 20 * 0.8 = 16
        let blocks = assemble_blocks(vec![
            token("first", 0, 0, 50, 20),
            token("second", 0, 30, 60, 20),
        ]);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].y, 30);
    }

    #[test]
    fn test_threshold_is_strict() {
        // v_gap == 16 == 20 * 0.8 is not the same line
        let blocks = assemble_blocks(vec![token("a", 0, 0, 10, 20), token("b", 12, 16, 10, 20)]);
        assert_eq!(blocks.len(), 2);

        // h_gap == 50 == 20 * 2.5 is not near
        let blocks = assemble_blocks(vec![token("a", 0, 0, 10, 20), token("b", 60, 0, 10, 20)]);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_height_grows_and_rescales_threshold() {
        // After absorbing the 40px token the gap threshold becomes 100px.
        let blocks = assemble_blocks(vec![
            token("small", 0, 0, 20, 10),
            token("BIG", 22, 5, 40, 40),
            token("far", 150, 6, 20, 10),
        ]);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].h, 40);
        assert_eq!(blocks[0].text, "small BIG far");
    }

    #[test]
    fn test_three_column_row() {
        let blocks = assemble_blocks(vec![
            token("left", 0, 0, 40, 10),
            token("col", 45, 0, 30, 10),
            token("middle", 300, 0, 60, 10),
            token("right", 600, 1, 50, 10),
        ]);

        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["left col", "middle", "right"]);
    }

    #[test]
    fn test_out_of_order_merge_extends_to_last_token() {
        // "b" sorts after "a" (larger y) but starts further left. The block width is
        // taken from the last token's right edge, so it no longer covers "a".
        let blocks = assemble_blocks(vec![token("a", 100, 0, 50, 20), token("b", 60, 5, 45, 20)]);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].x, 100);
        assert_eq!(blocks[0].w, 5);
    }

    #[test]
    fn test_out_of_order_merge_never_negative_width() {
        let blocks = assemble_blocks(vec![token("a", 100, 0, 50, 20), token("b", 10, 5, 20, 20)]);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].w, 0);
    }

    #[test]
    fn test_zero_height_block_never_merges() {
        let blocks = assemble_blocks(vec![token("a", 0, 0, 10, 0), token("b", 10, 0, 10, 0)]);

        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.font_size_px == 1));
    }

    #[test]
    fn test_no_token_lost() {
        let tokens: Vec<Token> = (0..40)
            .map(|i| token(&format!("w{}", i), (i % 7) * 37, (i / 7) * 25, 30, 18))
            .collect();

        let blocks = assemble_blocks(tokens.clone());
        let merged: usize = blocks.iter().map(|b| b.token_count).sum();

        assert!(!blocks.is_empty());
        assert_eq!(merged, tokens.len());
    }

    #[test]
    fn test_deterministic() {
        let tokens: Vec<Token> = (0..25)
            .map(|i| token(&format!("t{}", i), (i * 53) % 400, (i * 17) % 120, 25, 15))
            .collect();

        assert_eq!(assemble_blocks(tokens.clone()), assemble_blocks(tokens));
    }

    #[test]
    fn test_scale_invariant_grouping() {
        let base = vec![
            ("The", 10, 10, 30, 12),
            ("quick", 45, 11, 50, 12),
            ("fox", 200, 12, 30, 12),
            ("jumps", 10, 40, 50, 14),
            ("over", 66, 41, 40, 14),
        ];
        let grouping = |k: i64| -> Vec<usize> {
            let tokens = base
                .iter()
                .map(|&(t, x, y, w, h)| token(t, x * k, y * k, w * k, h * k))
                .collect::<Vec<_>>();
            assemble_blocks(tokens).iter().map(|b| b.token_count).collect()
        };

        assert_eq!(grouping(1), vec![2, 1, 2]);
        assert_eq!(grouping(3), grouping(1));
        assert_eq!(grouping(10), grouping(1));
    }

    #[test]
    fn test_font_size_within_token_heights() {
        let blocks = assemble_blocks(vec![
            token("tiny", 0, 0, 40, 10),
            token("Mixed", 42, 1, 60, 26),
            token("x", 105, 2, 8, 14),
        ]);

        assert_eq!(blocks.len(), 1);
        let size = blocks[0].font_size_px;
        assert!((10..=26).contains(&size), "font size {} out of range", size);
    }

    #[test]
    fn test_confidence_is_mean() {
        let blocks = BlockAssembler::new().assemble(&[
            Token::new("a", 60, 0, 0, 10, 10).unwrap(),
            Token::new("b", 90, 12, 0, 10, 10).unwrap(),
        ]);

        assert_eq!(blocks[0].confidence, 75.0);
    }

    #[test]
    fn test_custom_params() {
        let tokens = [token("a", 0, 0, 10, 20), token("b", 80, 0, 10, 20)];

        assert_eq!(BlockAssembler::new().assemble(&tokens).len(), 2);

        let loose = BlockAssembler::new().with_params(AssemblyParams {
            line_ratio: 0.8,
            gap_ratio: 4.0,
        });
        assert_eq!(loose.assemble(&tokens).len(), 1);
    }
}
