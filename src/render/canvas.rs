use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use crate::processing::layout::{Rect, Viewport};

/// Surface an actor paints itself onto.
pub trait Canvas {
    fn viewport(&self) -> Viewport;

    /// Paint `image` scaled into `dest` at `alpha` opacity, clipped to the
    /// canvas.
    fn draw_image(&mut self, image: &RgbaImage, dest: Rect, alpha: f32);
}

/// CPU canvas backed by an RGBA8 buffer. Bilinear sampling, source-over
/// blending.
pub struct RgbaCanvas {
    pixels: RgbaImage,
    background: Rgba<u8>,
}

impl RgbaCanvas {
    pub fn new(viewport: Viewport) -> Self {
        let background = Rgba([0, 0, 0, 255]);
        Self {
            pixels: RgbaImage::from_pixel(viewport.width, viewport.height, background),
            background,
        }
    }

    pub fn clear(&mut self) {
        for px in self.pixels.pixels_mut() {
            *px = self.background;
        }
    }

    /// Reallocate for a new size; contents are cleared.
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport != self.viewport() {
            self.pixels = RgbaImage::from_pixel(viewport.width, viewport.height, self.background);
        } else {
            self.clear();
        }
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.pixels
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("writing frame {}", path.display()))
    }
}

impl Canvas for RgbaCanvas {
    fn viewport(&self) -> Viewport {
        Viewport::new(self.pixels.width(), self.pixels.height())
    }

    fn draw_image(&mut self, image: &RgbaImage, dest: Rect, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha == 0.0 || dest.w <= 0.0 || dest.h <= 0.0 || image.width() == 0 || image.height() == 0 {
            return;
        }
        let (cw, ch) = (self.pixels.width() as f32, self.pixels.height() as f32);
        let x0 = dest.x.max(0.0).floor() as u32;
        let y0 = dest.y.max(0.0).floor() as u32;
        let x1 = dest.right().min(cw).ceil().max(0.0) as u32;
        let y1 = dest.bottom().min(ch).ceil().max(0.0) as u32;
        let sx = image.width() as f32 / dest.w;
        let sy = image.height() as f32 / dest.h;

        for y in y0..y1 {
            let py = y as f32 + 0.5;
            if py < dest.y || py >= dest.bottom() {
                continue;
            }
            let v = (py - dest.y) * sy - 0.5;
            for x in x0..x1 {
                let px = x as f32 + 0.5;
                if px < dest.x || px >= dest.right() {
                    continue;
                }
                let u = (px - dest.x) * sx - 0.5;
                let src = sample_bilinear(image, u, v);
                blend_over(self.pixels.get_pixel_mut(x, y), src, alpha);
            }
        }
    }
}

fn sample_bilinear(image: &RgbaImage, u: f32, v: f32) -> [f32; 4] {
    let max_x = (image.width() - 1) as f32;
    let max_y = (image.height() - 1) as f32;
    let u = u.clamp(0.0, max_x);
    let v = v.clamp(0.0, max_y);
    let (x0, y0) = (u.floor(), v.floor());
    let (fx, fy) = (u - x0, v - y0);
    let (x0, y0) = (x0 as u32, y0 as u32);
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);

    let p00 = image.get_pixel(x0, y0).0;
    let p10 = image.get_pixel(x1, y0).0;
    let p01 = image.get_pixel(x0, y1).0;
    let p11 = image.get_pixel(x1, y1).0;

    let mut out = [0.0; 4];
    for c in 0..4 {
        let top = f32::from(p00[c]) * (1.0 - fx) + f32::from(p10[c]) * fx;
        let bottom = f32::from(p01[c]) * (1.0 - fx) + f32::from(p11[c]) * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }
    out
}

fn blend_over(dst: &mut Rgba<u8>, src: [f32; 4], alpha: f32) {
    let a = (src[3] / 255.0) * alpha;
    let inv = 1.0 - a;
    for c in 0..3 {
        let v = src[c] * a + f32::from(dst.0[c]) * inv;
        dst.0[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    let out_a = a * 255.0 + f32::from(dst.0[3]) * inv;
    dst.0[3] = out_a.round().clamp(0.0, 255.0) as u8;
}
