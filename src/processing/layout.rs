//! Rectangle math for placing a photo inside the target area.

/// Size of the area the actor draws into. Re-read on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero width or height; motion and painting are skipped.
    pub const fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f32, self.height as f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    pub fn with_center(self, cx: f32, cy: f32) -> Self {
        Self::new(cx - self.w * 0.5, cy - self.h * 0.5, self.w, self.h)
    }

    /// Scale about the centre.
    pub fn scaled(self, factor: f32) -> Self {
        let (cx, cy) = self.center();
        Self::new(0.0, 0.0, self.w * factor, self.h * factor).with_center(cx, cy)
    }

    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }
}

/// Largest rectangle with the image's aspect ratio that fits the viewport,
/// centred. Letterboxes on the dimension with excess.
///
/// Returns `None` for a degenerate viewport or image.
pub fn fit_contain(viewport: Viewport, image_w: u32, image_h: u32) -> Option<Rect> {
    if viewport.is_degenerate() || image_w == 0 || image_h == 0 {
        return None;
    }
    let bounds = viewport.bounds();
    let image_aspect = image_w as f32 / image_h as f32;
    let view_aspect = bounds.w / bounds.h;

    let base = if image_aspect > view_aspect {
        Rect::new(0.0, 0.0, bounds.w, bounds.w / image_aspect)
    } else {
        Rect::new(0.0, 0.0, bounds.h * image_aspect, bounds.h)
    };
    let (cx, cy) = bounds.center();
    Some(base.with_center(cx, cy))
}

/// Zoom `base` about its centre and shift it by the pan fraction.
///
/// `pan` of (0.5, 0.5) keeps the zoomed rectangle centred; 0 and 1 push it to
/// the edges. Pan is clamped to [0, 1] and the travel to the zoomed overhang,
/// so the result always covers `base` when `zoom >= 1`.
pub fn zoom_and_pan(base: Rect, zoom: f32, pan: (f32, f32)) -> Rect {
    let zoomed = base.scaled(zoom);
    let max_pan_x = ((zoomed.w - base.w) * 0.5).max(0.0);
    let max_pan_y = ((zoomed.h - base.h) * 0.5).max(0.0);
    let px = pan.0.clamp(0.0, 1.0);
    let py = pan.1.clamp(0.0, 1.0);
    zoomed.translated((px - 0.5) * 2.0 * max_pan_x, (py - 0.5) * 2.0 * max_pan_y)
}
