//! Domain types for recognized words, reconstructed text blocks and page geometry.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::ValidationError;

/// One recognized word with its pixel bounding box and confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawToken")]
pub struct Token {
    /// Recognized text (NFC-normalized).
    pub text: String,

    /// Recognition confidence, 0-100.
    pub confidence: u8,

    /// Left edge in pixels.
    pub x: u32,

    /// Top edge in pixels (y grows downward).
    pub y: u32,

    /// Width in pixels.
    pub w: u32,

    /// Height in pixels.
    pub h: u32,
}

impl Token {
    /// Create a token, rejecting negative geometry and out-of-range confidence.
    pub fn new(
        text: impl AsRef<str>,
        confidence: i64,
        x: i64,
        y: i64,
        w: i64,
        h: i64,
    ) -> Result<Self, ValidationError> {
        if !(0..=100).contains(&confidence) {
            return Err(ValidationError::ConfidenceOutOfRange(confidence));
        }

        Ok(Self {
            text: text.as_ref().nfc().collect(),
            confidence: confidence as u8,
            x: non_negative("x", x)?,
            y: non_negative("y", y)?,
            w: non_negative("w", w)?,
            h: non_negative("h", h)?,
        })
    }

    /// Number of characters in the token text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// The token's bounding box.
    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.x, self.y, self.w, self.h)
    }
}

/// Unvalidated token record as it arrives from recognition output.
#[derive(Debug, Deserialize)]
struct RawToken {
    text: String,
    confidence: i64,
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

impl TryFrom<RawToken> for Token {
    type Error = ValidationError;

    fn try_from(raw: RawToken) -> Result<Self, Self::Error> {
        Token::new(raw.text, raw.confidence, raw.x, raw.y, raw.w, raw.h)
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeValue { field, value });
    }
    u32::try_from(value).map_err(|_| ValidationError::ValueTooLarge { field, value })
}

/// A finalized group of tokens: one reconstructed line or column fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Normalized block text.
    pub text: String,

    /// Left edge in pixels.
    pub x: u32,

    /// Top edge in pixels.
    pub y: u32,

    /// Width in pixels.
    pub w: u32,

    /// Height in pixels.
    pub h: u32,

    /// Character-weighted mean token height in pixels (always >= 1).
    pub font_size_px: u32,

    /// Mean recognition confidence of the merged tokens.
    pub confidence: f32,

    /// Number of tokens merged into this block.
    pub token_count: usize,
}

impl TextBlock {
    /// The block's bounding box.
    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.x, self.y, self.w, self.h)
    }
}

/// Axis-aligned rectangle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Grow the rectangle by `margin` on every side, saturating at zero.
    pub fn expand(&self, margin: u32) -> Self {
        let x = self.x.saturating_sub(margin);
        let y = self.y.saturating_sub(margin);
        Self {
            x,
            y,
            w: self.right().saturating_add(margin) - x,
            h: self.bottom().saturating_add(margin) - y,
        }
    }

    /// Intersect with an image of the given size.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self {
            x,
            y,
            w: self.right().min(width) - x,
            h: self.bottom().min(height) - y,
        }
    }
}

/// Rectangle expressed as fractions of a page's width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeRegion {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RelativeRegion {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// The bottom-right overlay area stamped by the slide export tool.
    pub fn bottom_right_watermark() -> Self {
        Self::new(0.8, 0.9, 1.0, 1.0)
    }

    /// Resolve to pixels for a page of the given size.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let scale =
            |v: f32, extent: u32| (v.clamp(0.0, 1.0) as f64 * extent as f64).round() as u32;
        let x0 = scale(self.left, width);
        let y0 = scale(self.top, height);
        let x1 = scale(self.right, width);
        let y1 = scale(self.bottom, height);
        PixelRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

impl Default for RelativeRegion {
    fn default() -> Self {
        Self::bottom_right_watermark()
    }
}

/// Rectangle in a physical target unit (EMU for presentations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitRect {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}
