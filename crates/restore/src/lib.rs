//! Background restoration for rebuilt slides.
//!
//! Erases the pixels under recognized text (and an optional fixed watermark
//! region) and synthesizes replacement background from the surrounding texture.
//! The result is a best-effort visual patch. The input raster is never modified,
//! but the erased content is not kept either: callers that need the original
//! must hold on to it themselves.

pub mod inpaint;
pub mod mask;

use image::{DynamicImage, GenericImageView, RgbImage};
use slide_core::config::{DEFAULT_INPAINT_RADIUS, DEFAULT_MASK_MARGIN};
use slide_core::{Error, RelativeRegion, Result, Settings, TextBlock};

pub use inpaint::inpaint_telea;
pub use mask::{build_mask, grow_mask, ERASE};

/// Tunables for background restoration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestoreOptions {
    /// Pixels added around each block box to cover anti-aliased edges.
    pub margin: u32,

    /// Dilation radius applied to the mask (1 = 3x3 structuring element).
    pub dilate_radius: u8,

    /// Inpainting propagation radius.
    pub inpaint_radius: u32,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            margin: DEFAULT_MASK_MARGIN,
            dilate_radius: 1,
            inpaint_radius: DEFAULT_INPAINT_RADIUS,
        }
    }
}

impl RestoreOptions {
    /// Options taken from conversion settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::default()
            .with_margin(settings.mask_margin)
            .with_inpaint_radius(settings.inpaint_radius)
    }

    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_dilate_radius(mut self, radius: u8) -> Self {
        self.dilate_radius = radius;
        self
    }

    pub fn with_inpaint_radius(mut self, radius: u32) -> Self {
        self.inpaint_radius = radius;
        self
    }
}

/// Erases text blocks from page rasters.
#[derive(Debug, Clone, Default)]
pub struct BackgroundRestorer {
    options: RestoreOptions,
}

impl BackgroundRestorer {
    pub fn new(options: RestoreOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RestoreOptions {
        &self.options
    }

    /// The grown erase mask for a page of the given size.
    pub fn mask(
        &self,
        width: u32,
        height: u32,
        blocks: &[TextBlock],
        watermark: Option<RelativeRegion>,
    ) -> image::GrayImage {
        let mask = build_mask(width, height, blocks, self.options.margin, watermark);
        grow_mask(&mask, self.options.dilate_radius)
    }

    /// Produce a copy of `raster` with every block and the watermark region filled in.
    ///
    /// Fails for a zero-sized raster or when the mask leaves nothing to sample from.
    pub fn restore(
        &self,
        raster: &DynamicImage,
        blocks: &[TextBlock],
        watermark: Option<RelativeRegion>,
    ) -> Result<RgbImage> {
        let (width, height) = raster.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::Restoration(format!(
                "cannot restore a {}x{} raster",
                width, height
            )));
        }

        let mask = self.mask(width, height, blocks, watermark);
        let erased = mask::erased_pixels(&mask);
        let rgb = raster.to_rgb8();

        if erased == 0 {
            log::debug!("Nothing to erase on {}x{} page", width, height);
            return Ok(rgb);
        }

        log::debug!(
            "Inpainting {} of {} pixels ({} blocks, radius {})",
            erased,
            width as usize * height as usize,
            blocks.len(),
            self.options.inpaint_radius
        );

        inpaint_telea(&rgb, &mask, self.options.inpaint_radius).ok_or_else(|| {
            Error::Restoration("mask covers the whole raster; nothing to sample from".to_string())
        })
    }
}

/// Restore a page background with default options.
pub fn restore_background(
    raster: &DynamicImage,
    blocks: &[TextBlock],
    watermark: Option<RelativeRegion>,
) -> Result<RgbImage> {
    BackgroundRestorer::default().restore(raster, blocks, watermark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn block(x: u32, y: u32, w: u32, h: u32) -> TextBlock {
        TextBlock {
            text: "Hello".to_string(),
            x,
            y,
            w,
            h,
            font_size_px: h,
            confidence: 95.0,
            token_count: 1,
        }
    }

    fn page_with_text() -> DynamicImage {
        let mut img = RgbImage::from_pixel(120, 80, Rgb([240, 240, 240]));
        for x in 20..60 {
            for y in 22..30 {
                if x % 3 != 0 {
                    img.put_pixel(x, y, Rgb([10, 10, 10]));
                }
            }
        }
        // watermark stamp in the bottom-right corner
        for x in 100..118 {
            img.put_pixel(x, 76, Rgb([50, 50, 200]));
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_restores_text_and_watermark() {
        let page = page_with_text();
        let out = restore_background(&page, &[block(20, 22, 40, 8)], Some(RelativeRegion::default()))
            .unwrap();

        assert_eq!(out.dimensions(), (120, 80));
        for (_, _, p) in out.enumerate_pixels() {
            assert_eq!(*p, Rgb([240, 240, 240]));
        }
    }

    #[test]
    fn test_input_not_mutated() {
        let page = page_with_text();
        let before = page.to_rgb8();

        let _ = restore_background(&page, &[block(20, 22, 40, 8)], None).unwrap();

        assert_eq!(page.to_rgb8(), before);
    }

    #[test]
    fn test_without_watermark_leaves_corner() {
        let page = page_with_text();
        let out = restore_background(&page, &[block(20, 22, 40, 8)], None).unwrap();

        assert_eq!(*out.get_pixel(105, 76), Rgb([50, 50, 200]));
        assert_eq!(*out.get_pixel(30, 25), Rgb([240, 240, 240]));
    }

    #[test]
    fn test_no_blocks_no_watermark_is_identity() {
        let page = page_with_text();
        let out = restore_background(&page, &[], None).unwrap();
        assert_eq!(out, page.to_rgb8());
    }

    #[test]
    fn test_zero_sized_raster_fails() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        let err = restore_background(&empty, &[], None).unwrap_err();
        assert!(matches!(err, Error::Restoration(_)));
    }

    #[test]
    fn test_block_covering_page_fails() {
        let page = page_with_text();
        let err = restore_background(&page, &[block(0, 0, 120, 80)], None).unwrap_err();
        assert!(matches!(err, Error::Restoration(_)));
    }

    #[test]
    fn test_mask_is_grown() {
        let restorer = BackgroundRestorer::new(RestoreOptions::default().with_margin(0));
        let mask = restorer.mask(50, 50, &[block(10, 10, 4, 4)], None);

        // 4x4 box dilated by one pixel on each side
        assert_eq!(mask::erased_pixels(&mask), 6 * 6);
    }

    #[test]
    fn test_options_from_settings() {
        let mut settings = Settings::default();
        settings.mask_margin = 5;
        settings.inpaint_radius = 7;

        let options = RestoreOptions::from_settings(&settings);
        assert_eq!(options.margin, 5);
        assert_eq!(options.inpaint_radius, 7);
        assert_eq!(options.dilate_radius, 1);
    }
}
