//! Conversion settings.
//!
//! Settings are read from a JSON file where every field is optional; missing
//! fields fall back to the defaults below. Command-line flags override the file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::assemble::{AssemblyParams, BlockAssembler};
use crate::error::{Error, Result};
use crate::filter::{TokenFilter, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::geometry::{FontScale, DEFAULT_DPI};
use crate::types::RelativeRegion;

/// Default margin, in pixels, added around each block before erasing it.
pub const DEFAULT_MASK_MARGIN: u32 = 2;

/// Default inpainting propagation radius in pixels.
pub const DEFAULT_INPAINT_RADIUS: u32 = 3;

/// Everything that tunes a conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Resolution pages were rasterized and recognized at.
    pub dpi: u32,

    /// Tokens at or below this confidence are dropped.
    pub confidence_threshold: u8,

    /// Merge tolerances for block assembly.
    pub assembly: AssemblyParams,

    /// Pixel-to-point font conversion.
    pub font: FontScale,

    /// Whether to erase recognized text from the page image.
    pub clean_background: bool,

    /// Margin around each block that is erased too.
    pub mask_margin: u32,

    /// Region erased on every page regardless of content. `null` disables it.
    pub watermark: Option<RelativeRegion>,

    /// Inpainting propagation radius.
    pub inpaint_radius: u32,

    /// Worker threads for page processing. `None` uses one per core.
    pub max_threads: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            assembly: AssemblyParams::default(),
            font: FontScale::default(),
            clean_background: true,
            mask_margin: DEFAULT_MASK_MARGIN,
            watermark: Some(RelativeRegion::bottom_right_watermark()),
            inpaint_radius: DEFAULT_INPAINT_RADIUS,
            max_threads: None,
        }
    }
}

impl Settings {
    /// Parse settings from JSON text.
    ///
    /// Font conversion follows `dpi` unless the file sets `font.reference_dpi`.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::Settings(e.to_string()))?;
        let explicit_reference = value.pointer("/font/reference_dpi").is_some();

        let mut settings: Self =
            serde_json::from_value(value).map_err(|e| Error::Settings(e.to_string()))?;
        if !explicit_reference {
            settings.font.reference_dpi = settings.dpi as f64;
        }
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&content)?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Settings(e.to_string()))
    }

    /// Set the scan resolution. Font conversion follows it.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self.font.reference_dpi = dpi as f64;
        self
    }

    pub fn with_clean_background(mut self, clean: bool) -> Self {
        self.clean_background = clean;
        self
    }

    pub fn with_font(mut self, font: FontScale) -> Self {
        self.font = font;
        self
    }

    pub fn with_max_threads(mut self, max_threads: Option<usize>) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Token filter built from these settings.
    pub fn token_filter(&self) -> TokenFilter {
        TokenFilter::new(self.confidence_threshold)
    }

    /// Block assembler built from these settings.
    pub fn assembler(&self) -> BlockAssembler {
        BlockAssembler::new().with_params(self.assembly)
    }
}
