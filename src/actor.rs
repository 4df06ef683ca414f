//! One photo's on-screen life: load, wait, fade in, drift, fade out.
//!
//! The actor is ticked by a fixed-rate clock and never blocks. The only
//! thing that happens elsewhere is the image load, which reports back through
//! the atomic state: the worker stores its result and then moves the actor
//! from `Loading` to `Init`, so the clock sees the image once it sees `Init`.

mod completion;
mod state;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use image::RgbaImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

pub use state::ActorState;

use completion::Completion;
use state::AtomicActorState;

use crate::config::ActorSettings;
use crate::processing::layout::{Rect, Viewport};
use crate::processing::motion::MotionController;
use crate::render::canvas::Canvas;
use crate::tasks::loader::{Handoff, LoadDispatch, LoadJob, LoadResult};

/// The part of an actor other threads may touch.
pub(crate) struct Shared {
    path: PathBuf,
    state: AtomicActorState,
    image: OnceLock<LoadResult>,
    loaded: Option<Sender<PathBuf>>,
}

impl Shared {
    /// Called by the load worker, exactly once.
    pub(crate) fn publish(&self, result: LoadResult) -> bool {
        if self.state.load() != ActorState::Loading {
            return false;
        }
        if self.image.set(result).is_err() {
            return false;
        }
        let advanced = self.state.advance(ActorState::Loading, ActorState::Init);
        if advanced && let Some(tx) = &self.loaded {
            let _ = tx.send(self.path.clone());
        }
        advanced
    }

    fn start_fade_in(&self) -> bool {
        let started = self.state.advance(ActorState::Waiting, ActorState::FadeIn);
        if started {
            debug!(path = %self.path.display(), "fade-in cued");
        }
        started
    }
}

/// Cheap, thread-safe view of an actor for callers that do not own it,
/// typically the previous actor's completion callback.
#[derive(Clone)]
pub struct ActorHandle {
    shared: Arc<Shared>,
}

impl ActorHandle {
    pub fn state(&self) -> ActorState {
        self.shared.state.load()
    }

    pub fn is_finished(&self) -> bool {
        self.state() == ActorState::Finished
    }

    /// Promote `Waiting -> FadeIn`. No-op in any other state.
    pub fn start_fade_in(&self) -> bool {
        self.shared.start_fade_in()
    }
}

impl std::fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorHandle")
            .field("path", &self.shared.path)
            .field("state", &self.state())
            .finish()
    }
}

/// Integer fade ramp; alpha is `step / steps`, so a full fade takes exactly
/// `steps` ticks.
#[derive(Debug, Clone, Copy)]
struct FadeRamp {
    step: u32,
    steps: u32,
}

impl FadeRamp {
    fn new(steps: u32) -> Self {
        Self {
            step: 0,
            steps: steps.max(1),
        }
    }

    fn alpha(&self) -> f32 {
        self.step as f32 / self.steps as f32
    }

    /// Returns true once fully opaque.
    fn raise(&mut self) -> bool {
        self.step = (self.step + 1).min(self.steps);
        self.step == self.steps
    }

    /// Returns true once fully transparent.
    fn lower(&mut self) -> bool {
        self.step = self.step.saturating_sub(1);
        self.step == 0
    }
}

/// What to paint for the current tick.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub image: &'a RgbaImage,
    pub dest: Rect,
    pub alpha: f32,
}

pub struct ActorBuilder {
    path: PathBuf,
    settings: ActorSettings,
    first_in_queue: bool,
    rng: Option<StdRng>,
    completion: Completion,
    loaded: Option<Sender<PathBuf>>,
}

impl ActorBuilder {
    /// Start fading in as soon as the image is ready instead of waiting for
    /// [`ImageActor::start_fade_in`].
    pub fn first_in_queue(mut self, first: bool) -> Self {
        self.first_in_queue = first;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    pub fn on_complete(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.completion = Completion::new(f);
        self
    }

    /// Receive the actor's path once its load result has been published.
    pub fn notify_loaded(mut self, tx: Sender<PathBuf>) -> Self {
        self.loaded = Some(tx);
        self
    }

    /// Build the actor and dispatch its load.
    ///
    /// Fails without dispatching if `settings` would make the actor panic
    /// later on the clock thread (inverted bands, zero rates).
    pub fn launch(self, loader: &dyn LoadDispatch) -> Result<ImageActor> {
        self.settings
            .validate()
            .with_context(|| format!("invalid actor settings for {}", self.path.display()))?;
        let shared = Arc::new(Shared {
            path: self.path.clone(),
            state: AtomicActorState::new(ActorState::None),
            image: OnceLock::new(),
            loaded: self.loaded,
        });
        let fade = FadeRamp::new(self.settings.fade_steps);
        let actor = ImageActor {
            shared: shared.clone(),
            first_in_queue: self.first_in_queue,
            rng: self.rng.unwrap_or_else(StdRng::from_os_rng),
            completion: self.completion,
            settings: self.settings,
            fade,
            remaining_ticks: 0,
            loading_ticks: 0,
            image: None,
            motion: None,
        };

        actor.goto(ActorState::None, ActorState::Loading);
        loader.dispatch(LoadJob {
            path: self.path.clone(),
            handoff: Handoff::new(self.path, shared),
        });
        Ok(actor)
    }
}

pub struct ImageActor {
    shared: Arc<Shared>,
    first_in_queue: bool,
    settings: ActorSettings,
    rng: StdRng,
    completion: Completion,
    fade: FadeRamp,
    remaining_ticks: u64,
    loading_ticks: u64,
    image: Option<Arc<RgbaImage>>,
    motion: Option<MotionController>,
}

impl ImageActor {
    pub fn builder(path: impl Into<PathBuf>, settings: &ActorSettings) -> ActorBuilder {
        ActorBuilder {
            path: path.into(),
            settings: settings.clone(),
            first_in_queue: false,
            rng: None,
            completion: Completion::new(|| {}),
            loaded: None,
        }
    }

    /// Advance the state machine by one clock tick and return the new state.
    ///
    /// `viewport` is the current target area; it is read fresh each tick.
    pub fn tick(&mut self, viewport: Viewport) -> ActorState {
        match self.state() {
            ActorState::None | ActorState::Waiting | ActorState::Finished => {}
            ActorState::Loading => self.tick_loading(),
            ActorState::Init => self.tick_init(),
            ActorState::FadeIn => {
                if self.fade.raise() {
                    self.goto(ActorState::FadeIn, ActorState::Moving);
                }
                self.animate(viewport);
            }
            ActorState::Moving => {
                self.animate(viewport);
                self.remaining_ticks = self.remaining_ticks.saturating_sub(1);
                if self.remaining_ticks == 0 {
                    self.goto(ActorState::Moving, ActorState::FadeOut);
                    self.completion.fire();
                }
            }
            ActorState::FadeOut => {
                if self.fade.lower() {
                    self.goto(ActorState::FadeOut, ActorState::Finished);
                }
                self.animate(viewport);
            }
        }
        self.state()
    }

    fn tick_loading(&mut self) {
        self.loading_ticks += 1;
        let Some(limit) = self.settings.load_timeout_ticks else {
            return;
        };
        if self.loading_ticks >= limit && self.goto(ActorState::Loading, ActorState::Finished) {
            warn!(path = %self.path().display(), ticks = self.loading_ticks, "load timed out; skipping image");
            self.completion.fire();
        }
    }

    fn tick_init(&mut self) {
        match self.shared.image.get() {
            Some(Ok(img)) => {
                self.image = Some(img.clone());
                self.motion = Some(MotionController::seeded(&self.settings.motion, &mut self.rng));
                self.remaining_ticks = self.settings.display_ticks();
                let next = if self.first_in_queue {
                    ActorState::FadeIn
                } else {
                    ActorState::Waiting
                };
                self.goto(ActorState::Init, next);
            }
            Some(Err(err)) => {
                warn!(error = %err, "image unavailable; skipping");
                self.fail_init();
            }
            None => {
                warn!(path = %self.path().display(), "init without a load result; skipping");
                self.fail_init();
            }
        }
    }

    fn fail_init(&mut self) {
        if self.goto(ActorState::Init, ActorState::Finished) {
            self.completion.fire();
        }
    }

    fn animate(&mut self, viewport: Viewport) {
        if let (Some(motion), Some(img)) = (self.motion.as_mut(), self.image.as_ref()) {
            motion.step(viewport, img.width(), img.height());
        }
    }

    fn goto(&self, from: ActorState, to: ActorState) -> bool {
        let moved = self.shared.state.advance(from, to);
        if moved {
            debug!(path = %self.path().display(), ?from, ?to, "actor state");
        }
        moved
    }

    /// Promote `Waiting -> FadeIn`. No-op in any other state.
    pub fn start_fade_in(&self) -> bool {
        self.shared.start_fade_in()
    }

    pub fn is_finished(&self) -> bool {
        self.state() == ActorState::Finished
    }

    pub fn state(&self) -> ActorState {
        self.shared.state.load()
    }

    pub fn handle(&self) -> ActorHandle {
        ActorHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn alpha(&self) -> f32 {
        self.fade.alpha()
    }

    /// Ticks left in `Moving` before the fade-out.
    pub fn remaining_ticks(&self) -> u64 {
        self.remaining_ticks
    }

    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref()
    }

    /// The image, destination and opacity to paint, if anything is visible.
    pub fn frame(&self) -> Option<Frame<'_>> {
        if !self.state().is_visible() {
            return None;
        }
        Some(Frame {
            image: self.image.as_deref()?,
            dest: self.motion.as_ref()?.target()?,
            alpha: self.alpha(),
        })
    }

    pub fn render(&self, canvas: &mut dyn Canvas) {
        if let Some(frame) = self.frame() {
            canvas.draw_image(frame.image, frame.dest, frame.alpha);
        }
    }
}

impl std::fmt::Debug for ImageActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageActor")
            .field("path", &self.shared.path)
            .field("state", &self.state())
            .field("alpha", &self.alpha())
            .field("remaining_ticks", &self.remaining_ticks)
            .finish_non_exhaustive()
    }
}
