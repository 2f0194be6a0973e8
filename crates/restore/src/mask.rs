//! Erase-mask construction.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::morphology;
use imageproc::rect::Rect;
use slide_core::{PixelRect, RelativeRegion, TextBlock};

/// Mask value for pixels that must be synthesized.
pub const ERASE: u8 = 255;

/// Mark every block box, grown by `margin`, and the watermark region as erase.
///
/// The two contributions are unioned: the watermark region is erased whether or
/// not any block reaches it.
pub fn build_mask(
    width: u32,
    height: u32,
    blocks: &[TextBlock],
    margin: u32,
    watermark: Option<RelativeRegion>,
) -> GrayImage {
    let mut mask = GrayImage::new(width, height);

    for block in blocks {
        fill(&mut mask, block.rect().expand(margin));
    }

    if let Some(region) = watermark {
        fill(&mut mask, region.to_pixels(width, height));
    }

    mask
}

/// Dilate the mask with a `(2 * radius + 1)` square structuring element.
pub fn grow_mask(mask: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    morphology::dilate(mask, Norm::LInf, radius)
}

/// Number of erase pixels in a mask.
pub fn erased_pixels(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] == ERASE).count()
}

fn fill(mask: &mut GrayImage, rect: PixelRect) {
    let rect = rect.clamp_to(mask.width(), mask.height());
    if rect.is_empty() {
        return;
    }
    let shape = Rect::at(rect.x as i32, rect.y as i32).of_size(rect.w, rect.h);
    draw_filled_rect_mut(mask, shape, Luma([ERASE]));
}
