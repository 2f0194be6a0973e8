//! Batch manifest and token file loading.

use anyhow::{Context, Result};
use serde::Deserialize;
use slide_core::{parse_tesseract_tsv, Token};
use std::path::{Path, PathBuf};

/// A list of page images with their OCR output.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Resolution the pages were rasterized at. Overrides the settings file.
    #[serde(default)]
    pub dpi: Option<u32>,

    pub pages: Vec<PageEntry>,
}

/// One page: a raster and its token file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageEntry {
    pub image: PathBuf,
    pub tokens: PathBuf,
}

impl Manifest {
    /// Parse manifest JSON. Relative paths are resolved against `base_dir`.
    pub fn from_json(json: &str, base_dir: &Path) -> Result<Self> {
        let mut manifest: Manifest =
            serde_json::from_str(json).context("Invalid manifest JSON")?;

        for page in &mut manifest.pages {
            page.image = base_dir.join(&page.image);
            page.tokens = base_dir.join(&page.tokens);
        }

        Ok(manifest)
    }

    /// Load a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

        Self::from_json(&content, base_dir)
            .with_context(|| format!("Failed to load manifest {}", path.display()))
    }
}

/// Load OCR tokens from Tesseract TSV (`.tsv`) or a JSON array of tokens.
pub fn load_tokens(path: &Path) -> Result<Vec<Token>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tokens {}", path.display()))?;

    let is_tsv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tsv"))
        .unwrap_or(false);

    if is_tsv {
        parse_tesseract_tsv(&content)
            .with_context(|| format!("Failed to parse TSV {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse token JSON {}", path.display()))
    }
}
