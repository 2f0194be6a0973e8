//! Conversion from pixel space to physical document units.
//!
//! Presentations measure geometry in EMU (English Metric Units, 914400 per inch)
//! and text in points. Pixel boxes only become physical once the resolution the
//! page was rasterized at is known, so every conversion takes it explicitly.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{PixelRect, UnitRect};

/// 1 inch = 914400 EMU.
pub const EMU_PER_INCH: i64 = 914_400;

/// 1 inch = 72 points.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Default resolution pages are rasterized and recognized at.
pub const DEFAULT_DPI: u32 = 300;

/// Default readability multiplier applied on top of the literal conversion.
///
/// OCR boxes hug the glyphs, so their height is smaller than the nominal size.
pub const DEFAULT_FONT_BOOST: f64 = 1.5;

/// Default smallest point size handed to the document writer.
pub const DEFAULT_MIN_FONT_PT: f64 = 8.0;

fn check_dpi(dpi: f64) -> Result<f64, ValidationError> {
    if dpi > 0.0 && dpi.is_finite() {
        Ok(dpi)
    } else {
        Err(ValidationError::NonPositiveDpi(dpi))
    }
}

/// Map a pixel box at `source_dpi` to a target unit with `units_per_inch`.
///
/// Each value is `pixels / source_dpi * units_per_inch`, truncated toward zero.
pub fn convert_geometry(
    px: PixelRect,
    source_dpi: f64,
    units_per_inch: f64,
) -> Result<UnitRect, ValidationError> {
    let dpi = check_dpi(source_dpi)?;
    let convert = |v: u32| (v as f64 / dpi * units_per_inch) as i64;

    Ok(UnitRect {
        x: convert(px.x),
        y: convert(px.y),
        w: convert(px.w),
        h: convert(px.h),
    })
}

/// Map a pixel font height to a point size.
///
/// `reference_dpi` is the resolution recognition ran at, which is not necessarily
/// the image's native resolution. The result never drops below `min_floor`.
pub fn convert_font_size(
    font_size_px: u32,
    reference_dpi: f64,
    boost_factor: f64,
    min_floor: f64,
) -> Result<f64, ValidationError> {
    let dpi = check_dpi(reference_dpi)?;
    let points = font_size_px as f64 / dpi * POINTS_PER_INCH * boost_factor;
    Ok(points.max(min_floor))
}

/// Font conversion settings for one document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontScale {
    /// Resolution recognition ran at.
    pub reference_dpi: f64,

    /// Multiplier over the literal pixel-to-point conversion.
    pub boost_factor: f64,

    /// Smallest point size produced.
    pub min_floor: f64,
}

impl Default for FontScale {
    fn default() -> Self {
        Self {
            reference_dpi: DEFAULT_DPI as f64,
            boost_factor: DEFAULT_FONT_BOOST,
            min_floor: DEFAULT_MIN_FONT_PT,
        }
    }
}

impl FontScale {
    pub fn with_reference_dpi(mut self, dpi: f64) -> Self {
        self.reference_dpi = dpi;
        self
    }

    pub fn with_boost_factor(mut self, boost: f64) -> Self {
        self.boost_factor = boost;
        self
    }

    pub fn with_min_floor(mut self, floor: f64) -> Self {
        self.min_floor = floor;
        self
    }

    /// Point size for a block font height in pixels.
    pub fn points(&self, font_size_px: u32) -> Result<f64, ValidationError> {
        convert_font_size(
            font_size_px,
            self.reference_dpi,
            self.boost_factor,
            self.min_floor,
        )
    }
}

/// Convert pixels to EMU.
pub fn px_to_emu(pixels: u32, dpi: u32) -> Result<i64, ValidationError> {
    let dpi = check_dpi(dpi as f64)?;
    Ok((pixels as f64 / dpi * EMU_PER_INCH as f64) as i64)
}

/// Convert EMU to pixels.
pub fn emu_to_px(emu: i64, dpi: u32) -> Result<i64, ValidationError> {
    let dpi = check_dpi(dpi as f64)?;
    Ok((emu as f64 / EMU_PER_INCH as f64 * dpi) as i64)
}

/// Slide size in EMU for an image of the given pixel size.
pub fn slide_dimensions(
    width_px: u32,
    height_px: u32,
    dpi: u32,
) -> Result<(i64, i64), ValidationError> {
    Ok((px_to_emu(width_px, dpi)?, px_to_emu(height_px, dpi)?))
}

/// Rescale a pixel box between two resolutions.
pub fn scale_coordinates(
    rect: PixelRect,
    source_dpi: u32,
    target_dpi: u32,
) -> Result<PixelRect, ValidationError> {
    let scale = target_dpi as f64 / check_dpi(source_dpi as f64)?;
    let scaled = |v: u32| (v as f64 * scale) as u32;

    Ok(PixelRect::new(
        scaled(rect.x),
        scaled(rect.y),
        scaled(rect.w),
        scaled(rect.h),
    ))
}

/// Width over height, or `None` for a zero height.
pub fn aspect_ratio(width: u32, height: u32) -> Option<f64> {
    if height == 0 {
        return None;
    }
    Some(width as f64 / height as f64)
}
