//! Error types for slide reconstruction.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A malformed input record, rejected instead of being clamped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A geometry field was negative.
    #[error("{field} must be non-negative, got {value}")]
    NegativeValue {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// A geometry field too large for a pixel coordinate.
    #[error("{field} exceeds {max}, got {value}", max = u32::MAX)]
    ValueTooLarge {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// Confidence outside the 0-100 range.
    #[error("confidence must be within 0..=100, got {0}")]
    ConfidenceOutOfRange(i64),

    /// A resolution that cannot be divided by.
    #[error("resolution must be positive, got {0}")]
    NonPositiveDpi(f64),
}

/// Errors that can occur while rebuilding slides.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A token or conversion parameter was malformed.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Recognition output could not be parsed into tokens.
    #[error("Token parsing error: {0}")]
    TokenParse(String),

    /// The settings file could not be parsed.
    #[error("Settings error: {0}")]
    Settings(String),

    /// The inpainting step could not process the raster.
    #[error("Background restoration failed: {0}")]
    Restoration(String),

    /// Image decoding or encoding failed.
    #[error("Image error: {0}")]
    Image(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML writing error (for PPTX).
    #[error("XML error: {0}")]
    XmlError(String),

    /// A presentation was requested without any pages.
    #[error("Presentation has no pages")]
    EmptyPresentation,
}
