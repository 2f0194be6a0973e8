//! Core domain types, token filtering, adaptive block assembly, font estimation
//! and unit conversion for rebuilding editable slides from OCR output.

pub mod assemble;
pub mod config;
pub mod error;
pub mod filter;
pub mod font;
pub mod geometry;
pub mod normalize;
pub mod tsv;
pub mod types;

pub use assemble::{assemble_blocks, AssemblyParams, BlockAssembler};
pub use config::Settings;
pub use error::{Error, Result, ValidationError};
pub use filter::TokenFilter;
pub use font::FontMetrics;
pub use geometry::{convert_font_size, convert_geometry, FontScale, EMU_PER_INCH};
pub use normalize::normalize_block_text;
pub use tsv::parse_tesseract_tsv;
pub use types::{PixelRect, RelativeRegion, TextBlock, Token, UnitRect};
