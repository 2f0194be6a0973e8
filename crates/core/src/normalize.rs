//! Script-aware cleanup of assembled block text.
//!
//! The assembler joins tokens with a single space. Japanese and Chinese text is not
//! space-delimited, so a separator between two CJK tokens is an artifact of the
//! merge and is removed. Separators next to Latin text or digits are kept.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Whitespace run sandwiched between two CJK code points.
///
/// U+3000 (ideographic space) is whitespace, so the range starts after it.
static CJK_GAP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\x{3001}-\x{9FFF}])\s+([\x{3001}-\x{9FFF}])").unwrap());

/// Whether `c` is in the Hiragana/Katakana/CJK ideograph span.
pub fn is_cjk(c: char) -> bool {
    ('\u{3001}'..='\u{9FFF}').contains(&c)
}

/// Normalize the concatenated text of a finalized block.
///
/// Removes whitespace runs between two CJK characters and trims both ends.
/// Applying it twice yields the same string.
pub fn normalize_block_text(text: &str) -> String {
    let mut result = text.trim().to_string();

    // Matches consume their trailing CJK character, so "私 は 元" needs a second pass
    // to reach the gap after "は".
    while let Cow::Owned(collapsed) = CJK_GAP_REGEX.replace_all(&result, "$1$2") {
        result = collapsed;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_space_between_cjk() {
        assert_eq!(normalize_block_text("私 は"), "私は");
        assert_eq!(normalize_block_text("カタ カナ"), "カタカナ");
    }

    #[test]
    fn test_collapses_consecutive_gaps() {
        assert_eq!(normalize_block_text("私 は 元 気"), "私は元気");
        assert_eq!(normalize_block_text("私  \t は"), "私は");
    }

    #[test]
    fn test_keeps_space_between_cjk_and_latin() {
        assert_eq!(normalize_block_text("東京 Tower"), "東京 Tower");
        assert_eq!(normalize_block_text("第 3 章"), "第 3 章");
        assert_eq!(normalize_block_text("Hello World"), "Hello World");
    }

    #[test]
    fn test_ideographic_space_is_treated_as_whitespace() {
        assert_eq!(normalize_block_text("私\u{3000}は"), "私は");
        assert_eq!(normalize_block_text("\u{3000}私\u{3000}"), "私");
    }

    #[test]
    fn test_trims() {
        assert_eq!(normalize_block_text("  hello  "), "hello");
        assert_eq!(normalize_block_text(""), "");
    }

    #[test]
    fn test_idempotent() {
        for input in ["私 は 元 気 です", "東京 Tower 展望 台", "a  b", " 日本 語 "] {
            let once = normalize_block_text(input);
            assert_eq!(normalize_block_text(&once), once);
        }
    }

    #[test]
    fn test_is_cjk() {
        assert!(is_cjk('私'));
        assert!(is_cjk('カ'));
        assert!(is_cjk('ひ'));
        assert!(!is_cjk('\u{3000}'));
        assert!(!is_cjk('A'));
        assert!(!is_cjk('3'));
    }
}
