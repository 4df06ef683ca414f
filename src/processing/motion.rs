//! Ken-Burns motion: integrate zoom and pan, ease velocity reversals at the
//! band edges, and turn the result into a destination rectangle.

use rand::Rng;

use crate::config::{Band, MotionOptions};
use crate::processing::layout::{Rect, Viewport, fit_contain, zoom_and_pan};

/// One animated scalar with its reversal easing state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EasedAxis {
    pub value: f32,
    pub velocity: f32,
    pub required_velocity: f32,
    pub reversing: bool,
}

impl EasedAxis {
    pub fn new(value: f32, velocity: f32) -> Self {
        Self {
            value,
            velocity,
            required_velocity: velocity,
            reversing: false,
        }
    }

    /// Advance one tick.
    ///
    /// Leaving `band` arms a reversal towards the negated velocity; while
    /// armed the velocity closes `easing` of the remaining gap per tick and
    /// snaps once within `epsilon`.
    pub fn step(&mut self, band: Band, easing: f32, epsilon: f32) {
        self.value += self.velocity;

        if !self.reversing && band.is_leaving(self.value, self.velocity) {
            self.required_velocity = -self.velocity;
            self.reversing = true;
        }

        if self.reversing {
            self.velocity += easing * (self.required_velocity - self.velocity);
            if (self.required_velocity - self.velocity).abs() <= epsilon {
                self.velocity = self.required_velocity;
                self.reversing = false;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MotionController {
    opts: MotionOptions,
    zoom: EasedAxis,
    pan_x: EasedAxis,
    pan_y: EasedAxis,
    target: Option<Rect>,
}

impl MotionController {
    /// Draw a starting zoom, pan position and velocities from `rng`.
    pub fn seeded<R: Rng + ?Sized>(opts: &MotionOptions, rng: &mut R) -> Self {
        let jitter = opts.zoom_jitter.abs();
        let zoom = opts.zoom_base + rng.random_range(-jitter..=jitter);
        let zoom_speed = opts.zoom_speed.abs();
        let pan_speed = opts.pan_speed.abs();

        Self {
            opts: opts.clone(),
            zoom: EasedAxis::new(zoom, rng.random_range(-zoom_speed..=zoom_speed)),
            pan_x: EasedAxis::new(
                opts.pan_band.sample(rng),
                rng.random_range(-pan_speed..=pan_speed),
            ),
            pan_y: EasedAxis::new(
                opts.pan_band.sample(rng),
                rng.random_range(-pan_speed..=pan_speed),
            ),
            target: None,
        }
    }

    /// Build from explicit starting axes, bypassing the random draw.
    pub fn from_axes(
        opts: &MotionOptions,
        zoom: EasedAxis,
        pan_x: EasedAxis,
        pan_y: EasedAxis,
    ) -> Self {
        Self {
            opts: opts.clone(),
            zoom,
            pan_x,
            pan_y,
            target: None,
        }
    }

    /// Run one tick of motion and recompute the destination rectangle.
    ///
    /// A degenerate viewport or image skips the update entirely and clears
    /// the target, so nothing gets painted.
    pub fn step(&mut self, viewport: Viewport, image_w: u32, image_h: u32) -> Option<Rect> {
        let Some(base) = fit_contain(viewport, image_w, image_h) else {
            self.target = None;
            return None;
        };

        let (easing, eps) = (self.opts.easing, self.opts.easing_epsilon);
        self.zoom.step(self.opts.zoom_band, easing, eps);
        self.pan_x.step(self.opts.pan_band, easing, eps);
        self.pan_y.step(self.opts.pan_band, easing, eps);

        let rect = zoom_and_pan(base, self.zoom.value, (self.pan_x.value, self.pan_y.value));
        self.target = Some(rect);
        Some(rect)
    }

    pub fn target(&self) -> Option<Rect> {
        self.target
    }

    pub fn zoom(&self) -> &EasedAxis {
        &self.zoom
    }

    pub fn pan_x(&self) -> &EasedAxis {
        &self.pan_x
    }

    pub fn pan_y(&self) -> &EasedAxis {
        &self.pan_y
    }
}
