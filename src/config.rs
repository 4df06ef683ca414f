use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use rand::Rng;
use serde::Deserialize;

/// Closed interval a motion value is kept inside. Written as `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 2]")]
pub struct Band {
    pub min: f32,
    pub max: f32,
}

impl From<[f32; 2]> for Band {
    fn from([min, max]: [f32; 2]) -> Self {
        Self { min, max }
    }
}

impl Band {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, v: f32) -> bool {
        (self.min..=self.max).contains(&v)
    }

    /// Outside the band and still heading away from it.
    pub fn is_leaving(&self, value: f32, velocity: f32) -> bool {
        (value > self.max && velocity > 0.0) || (value < self.min && velocity < 0.0)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        rng.random_range(self.min..=self.max)
    }

    fn validate(&self, name: &str) -> Result<()> {
        ensure!(
            self.min.is_finite() && self.max.is_finite(),
            "{name} must be finite"
        );
        ensure!(self.min < self.max, "{name} must satisfy min < max");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MotionOptions {
    /// Centre of the starting zoom draw.
    pub zoom_base: f32,
    /// Starting zoom is `zoom-base ± zoom-jitter`.
    pub zoom_jitter: f32,
    pub zoom_band: Band,
    /// Largest zoom change per tick.
    pub zoom_speed: f32,
    /// Pan positions are normalised to [0, 1]; this is where reversals start.
    pub pan_band: Band,
    pub pan_speed: f32,
    /// Fraction of the remaining velocity gap closed per tick while reversing.
    pub easing: f32,
    pub easing_epsilon: f32,
}

impl Default for MotionOptions {
    fn default() -> Self {
        Self {
            zoom_base: 1.2,
            zoom_jitter: 0.1,
            zoom_band: Band::new(1.05, 1.65),
            zoom_speed: 0.0005,
            pan_band: Band::new(0.05, 0.95),
            pan_speed: 0.0003,
            easing: 0.01,
            easing_epsilon: 1e-6,
        }
    }
}

impl MotionOptions {
    fn validate(&self) -> Result<()> {
        self.zoom_band.validate("motion.zoom-band")?;
        self.pan_band.validate("motion.pan-band")?;
        ensure!(self.zoom_band.min > 0.0, "motion.zoom-band must be positive");
        ensure!(
            self.pan_band.min >= 0.0 && self.pan_band.max <= 1.0,
            "motion.pan-band must lie inside [0, 1]"
        );
        ensure!(self.zoom_jitter >= 0.0, "motion.zoom-jitter must not be negative");
        ensure!(
            self.zoom_band.contains(self.zoom_base - self.zoom_jitter)
                && self.zoom_band.contains(self.zoom_base + self.zoom_jitter),
            "motion.zoom-base ± zoom-jitter must lie inside motion.zoom-band"
        );
        ensure!(
            self.zoom_speed >= 0.0 && self.pan_speed >= 0.0,
            "motion speeds must not be negative"
        );
        ensure!(
            self.easing > 0.0 && self.easing <= 1.0,
            "motion.easing must be in (0, 1]"
        );
        ensure!(
            self.easing_epsilon > 0.0,
            "motion.easing-epsilon must be positive"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Time each image stays fully on screen before fading out.
    pub seconds_per_image: u32,
    /// Animation ticks per second.
    pub clock_rate_hz: u32,
    /// Alpha change per tick during fades.
    pub fade_step: f32,
    /// Give up on a load that takes longer than this.
    #[serde(with = "humantime_serde")]
    pub load_timeout: Option<Duration>,
    /// Optional deterministic seed for motion paths.
    pub motion_seed: Option<u64>,
    /// How many decoded images the shared cache keeps.
    pub image_cache_capacity: usize,
    pub motion: MotionOptions,
}

impl Configuration {
    pub const SECONDS_PER_IMAGE_RANGE: std::ops::RangeInclusive<u32> = 3..=15;

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            Self::SECONDS_PER_IMAGE_RANGE.contains(&self.seconds_per_image),
            "seconds-per-image must be between 3 and 15, got {}",
            self.seconds_per_image
        );
        ensure!(self.clock_rate_hz > 0, "clock-rate-hz must be greater than zero");
        ensure!(
            self.fade_step > 0.0 && self.fade_step <= 1.0,
            "fade-step must be in (0, 1]"
        );
        ensure!(
            self.image_cache_capacity > 0,
            "image-cache-capacity must be greater than zero"
        );
        if let Some(t) = self.load_timeout {
            ensure!(!t.is_zero(), "load-timeout must be positive");
        }
        self.motion.validate().context("invalid motion configuration")?;
        Ok(self)
    }

    pub fn cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.image_cache_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Per-actor view of the configuration, with durations converted to ticks.
    pub fn actor_settings(&self) -> ActorSettings {
        let rate = self.clock_rate_hz.max(1);
        let load_timeout_ticks = self
            .load_timeout
            .map(|t| (t.as_secs_f64() * f64::from(rate)).ceil().max(1.0) as u64);
        ActorSettings {
            seconds_per_image: self.seconds_per_image,
            clock_rate_hz: rate,
            fade_steps: fade_steps_for(self.fade_step),
            load_timeout_ticks,
            motion: self.motion.clone(),
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            seconds_per_image: 5,
            clock_rate_hz: 60,
            fade_step: 0.01,
            load_timeout: None,
            motion_seed: None,
            image_cache_capacity: 4,
            motion: MotionOptions::default(),
        }
    }
}

/// Number of ticks a full fade takes for a given alpha step.
pub fn fade_steps_for(fade_step: f32) -> u32 {
    if fade_step.is_nan() || fade_step <= 0.0 {
        return 1;
    }
    (1.0 / fade_step).round().clamp(1.0, u32::MAX as f32) as u32
}

/// Everything an actor needs from configuration.
#[derive(Debug, Clone)]
pub struct ActorSettings {
    pub seconds_per_image: u32,
    pub clock_rate_hz: u32,
    pub fade_steps: u32,
    pub load_timeout_ticks: Option<u64>,
    pub motion: MotionOptions,
}

impl ActorSettings {
    /// Settings built in code skip [`Configuration::validated`]; this checks
    /// what the actor relies on.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.clock_rate_hz > 0, "clock rate must be greater than zero");
        ensure!(self.fade_steps > 0, "fade must take at least one tick");
        if let Some(ticks) = self.load_timeout_ticks {
            ensure!(ticks > 0, "load timeout must be at least one tick");
        }
        self.motion.validate().context("invalid motion configuration")
    }

    /// Ticks spent in `Moving` before the fade-out begins.
    pub fn display_ticks(&self) -> u64 {
        u64::from(self.seconds_per_image) * u64::from(self.clock_rate_hz)
    }
}

impl Default for ActorSettings {
    fn default() -> Self {
        Configuration::default().actor_settings()
    }
}
