//! PPTX (Office Open XML) writer for rebuilt slide decks.
//!
//! Produces .pptx files, which are ZIP archives containing XML documents: one
//! slide per page with the restored background as a full-slide picture and an
//! editable text box per recognized block.

pub mod templates;
pub mod writer;

pub use writer::{PptxWriter, SlidePage, DEFAULT_FONT_NAME};
