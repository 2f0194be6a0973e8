//! Fast-marching inpainting (Telea 2004).
//!
//! Masked pixels are filled in order of their distance from the mask boundary.
//! Each pixel becomes a weighted mean of already-known pixels within `radius`,
//! favouring close neighbours, neighbours on the same distance level set, and
//! neighbours along the marching direction. The small radius suits thin strokes
//! such as text, where the surrounding background is sampled from a short reach.

use image::{GrayImage, Rgb, RgbImage};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

const KNOWN: u8 = 0;
const BAND: u8 = 1;
const INSIDE: u8 = 2;

/// Arrival time of pixels the front has not reached.
const FAR: f32 = 1.0e6;

/// Fill every nonzero mask pixel of `image` from its surroundings.
///
/// Returns `None` when the mask leaves no known pixel to propagate from.
pub fn inpaint_telea(image: &RgbImage, mask: &GrayImage, radius: u32) -> Option<RgbImage> {
    let mut state = March::new(image, mask, radius.max(1));
    if state.heap.is_empty() {
        return if state.flags.contains(&INSIDE) {
            None
        } else {
            Some(state.out)
        };
    }

    state.run();
    Some(state.out)
}

struct March {
    width: i64,
    height: i64,
    radius: i64,
    flags: Vec<u8>,
    dist: Vec<f32>,
    out: RgbImage,
    // Non-negative floats order like their bit patterns.
    heap: BinaryHeap<Reverse<(u32, usize)>>,
}

impl March {
    fn new(image: &RgbImage, mask: &GrayImage, radius: u32) -> Self {
        let (w, h) = image.dimensions();
        let len = w as usize * h as usize;

        let mut march = Self {
            width: w as i64,
            height: h as i64,
            radius: radius as i64,
            flags: vec![KNOWN; len],
            dist: vec![0.0; len],
            out: image.clone(),
            heap: BinaryHeap::new(),
        };

        for (x, y, p) in mask.enumerate_pixels() {
            if p[0] != 0 && x < w && y < h {
                let i = march.index(x as i64, y as i64);
                march.flags[i] = INSIDE;
                march.dist[i] = FAR;
            }
        }

        // The initial front: known pixels touching the masked area.
        for y in 0..march.height {
            for x in 0..march.width {
                let i = march.index(x, y);
                if march.flags[i] != KNOWN {
                    continue;
                }
                let touches_mask = march
                    .neighbours(x, y)
                    .any(|(nx, ny)| march.flags[march.index(nx, ny)] == INSIDE);
                if touches_mask {
                    march.flags[i] = BAND;
                    march.heap.push(Reverse((0.0f32.to_bits(), i)));
                }
            }
        }

        march
    }

    fn index(&self, x: i64, y: i64) -> usize {
        (y * self.width + x) as usize
    }

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn neighbours(&self, x: i64, y: i64) -> impl Iterator<Item = (i64, i64)> + '_ {
        [(x, y - 1), (x - 1, y), (x + 1, y), (x, y + 1)]
            .into_iter()
            .filter(move |&(nx, ny)| self.in_bounds(nx, ny))
    }

    fn flag(&self, x: i64, y: i64) -> u8 {
        if self.in_bounds(x, y) {
            self.flags[self.index(x, y)]
        } else {
            INSIDE
        }
    }

    fn time(&self, x: i64, y: i64) -> f32 {
        if self.in_bounds(x, y) {
            self.dist[self.index(x, y)]
        } else {
            FAR
        }
    }

    fn run(&mut self) {
        while let Some(Reverse((_, i))) = self.heap.pop() {
            if self.flags[i] == KNOWN {
                continue;
            }
            self.flags[i] = KNOWN;

            let x = i as i64 % self.width;
            let y = i as i64 / self.width;
            let next: Vec<(i64, i64)> = self.neighbours(x, y).collect();

            for (nx, ny) in next {
                let n = self.index(nx, ny);
                if self.flags[n] != INSIDE {
                    continue;
                }

                let t = self
                    .solve(nx, ny - 1, nx - 1, ny)
                    .min(self.solve(nx, ny + 1, nx - 1, ny))
                    .min(self.solve(nx, ny - 1, nx + 1, ny))
                    .min(self.solve(nx, ny + 1, nx + 1, ny));
                self.dist[n] = t;
                self.flags[n] = BAND;

                let value = self.fill_value(nx, ny);
                self.out.put_pixel(nx as u32, ny as u32, value);
                self.heap.push(Reverse((t.to_bits(), n)));
            }
        }
    }

    /// First-order upwind solution of |grad T| = 1 from a vertical and a horizontal neighbour.
    fn solve(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> f32 {
        let a = self.time(x1, y1);
        let b = self.time(x2, y2);
        let a_known = self.flag(x1, y1) != INSIDE;
        let b_known = self.flag(x2, y2) != INSIDE;

        match (a_known, b_known) {
            (true, true) => {
                let diff = a - b;
                if diff.abs() >= 1.0 {
                    1.0 + a.min(b)
                } else {
                    (a + b + (2.0 - diff * diff).sqrt()) * 0.5
                }
            }
            (true, false) => 1.0 + a,
            (false, true) => 1.0 + b,
            (false, false) => 1.0 + a.min(b),
        }
    }

    /// Central difference of the arrival time, falling back to one-sided.
    fn time_gradient(&self, x: i64, y: i64) -> (f32, f32) {
        let axis = |prev: (i64, i64), next: (i64, i64)| {
            let here = self.time(x, y);
            match (self.flag(prev.0, prev.1) != INSIDE, self.flag(next.0, next.1) != INSIDE) {
                (true, true) => (self.time(next.0, next.1) - self.time(prev.0, prev.1)) * 0.5,
                (false, true) => self.time(next.0, next.1) - here,
                (true, false) => here - self.time(prev.0, prev.1),
                (false, false) => 0.0,
            }
        };

        (axis((x - 1, y), (x + 1, y)), axis((x, y - 1), (x, y + 1)))
    }

    fn fill_value(&self, x: i64, y: i64) -> Rgb<u8> {
        let (gx, gy) = self.time_gradient(x, y);
        let t = self.time(x, y);
        let r2_max = self.radius * self.radius;

        let mut sum = [0.0f64; 3];
        let mut weight_sum = 0.0f64;

        for ny in (y - self.radius)..=(y + self.radius) {
            for nx in (x - self.radius)..=(x + self.radius) {
                let (dx, dy) = (x - nx, y - ny);
                let r2 = dx * dx + dy * dy;
                if r2 == 0 || r2 > r2_max || self.flag(nx, ny) == INSIDE {
                    continue;
                }

                let len2 = r2 as f32;
                let dst = 1.0 / (len2 * len2.sqrt());
                let lev = 1.0 / (1.0 + (self.time(nx, ny) - t).abs());
                let mut dir = dx as f32 * gx + dy as f32 * gy;
                if dir.abs() <= 0.01 {
                    dir = 1.0e-6;
                }

                let w = (dst * lev * dir).abs() as f64;
                let p = self.out.get_pixel(nx as u32, ny as u32);
                for c in 0..3 {
                    sum[c] += w * p[c] as f64;
                }
                weight_sum += w;
            }
        }

        if weight_sum <= 0.0 {
            return *self.out.get_pixel(x as u32, y as u32);
        }

        Rgb([0, 1, 2].map(|c| (sum[c] / weight_sum).round().clamp(0.0, 255.0) as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_rect(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if x >= x0 && x < x1 && y >= y0 && y < y1 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_flat_background_is_recovered() {
        let mut image = RgbImage::from_pixel(40, 30, Rgb([200, 180, 40]));
        // "text" strokes
        for x in 10..30 {
            image.put_pixel(x, 14, Rgb([0, 0, 0]));
            image.put_pixel(x, 15, Rgb([0, 0, 0]));
        }
        let mask = mask_rect(40, 30, 8, 12, 32, 18);

        let out = inpaint_telea(&image, &mask, 3).unwrap();

        for (_, _, p) in out.enumerate_pixels() {
            assert_eq!(*p, Rgb([200, 180, 40]));
        }
    }

    #[test]
    fn test_known_pixels_untouched() {
        let image = RgbImage::from_fn(20, 20, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 7]));
        let mask = mask_rect(20, 20, 5, 5, 9, 9);

        let out = inpaint_telea(&image, &mask, 3).unwrap();

        for (x, y, p) in image.enumerate_pixels() {
            if mask.get_pixel(x, y)[0] == 0 {
                assert_eq!(out.get_pixel(x, y), p);
            }
        }
    }

    #[test]
    fn test_fill_stays_within_neighbour_range() {
        // Left half dark, right half light; the fill must stay between them.
        let image = RgbImage::from_fn(30, 10, |x, _| {
            if x < 15 {
                Rgb([20, 20, 20])
            } else {
                Rgb([220, 220, 220])
            }
        });
        let mask = mask_rect(30, 10, 12, 3, 18, 7);

        let out = inpaint_telea(&image, &mask, 3).unwrap();

        for y in 3..7 {
            for x in 12..18 {
                let v = out.get_pixel(x, y)[0];
                assert!((20..=220).contains(&v));
            }
        }
        assert!(out.get_pixel(12, 5)[0] < out.get_pixel(17, 5)[0]);
    }

    #[test]
    fn test_mask_touching_border() {
        let image = RgbImage::from_pixel(16, 16, Rgb([90, 90, 90]));
        let mask = mask_rect(16, 16, 10, 10, 16, 16);

        let out = inpaint_telea(&image, &mask, 3).unwrap();
        assert_eq!(*out.get_pixel(15, 15), Rgb([90, 90, 90]));
    }

    #[test]
    fn test_empty_mask_returns_copy() {
        let image = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        let out = inpaint_telea(&image, &GrayImage::new(4, 4), 3).unwrap();
        assert_eq!(out, image);
    }

    #[test]
    fn test_full_mask_has_no_source() {
        let image = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        let mask = GrayImage::from_pixel(4, 4, Luma([255]));
        assert!(inpaint_telea(&image, &mask, 3).is_none());
    }
}
