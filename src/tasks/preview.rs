//! Headless slideshow over a list of paths.
//!
//! Keeps the playing actor plus one preloaded actor waiting behind it. When
//! the playing actor's completion callback fires, the waiting one is cued,
//! so the two crossfade. Every tick all live actors are painted, oldest
//! first, onto one [`RgbaCanvas`].

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actor::{ActorState, ImageActor};
use crate::config::ActorSettings;
use crate::events::{SlideCompleted, SlideOutcome};
use crate::processing::layout::Viewport;
use crate::render::canvas::RgbaCanvas;
use crate::tasks::clock;
use crate::tasks::loader::LoadDispatch;

/// Where and how often to dump rendered frames.
#[derive(Debug, Clone)]
pub struct FrameSink {
    pub dir: PathBuf,
    pub every: u64,
}

struct Slot {
    id: usize,
    actor: ImageActor,
    started: bool,
}

pub struct Preview {
    settings: ActorSettings,
    loader: Arc<dyn LoadDispatch>,
    seed: Option<u64>,
    viewport: Viewport,
    pending: VecDeque<PathBuf>,
    live: Vec<Slot>,
    next_id: usize,
    current: Option<usize>,
    cue: bool,
    completed_tx: Sender<SlideCompleted>,
    completed_rx: Receiver<SlideCompleted>,
    loaded_tx: Sender<PathBuf>,
    loaded_rx: Receiver<PathBuf>,
    canvas: RgbaCanvas,
    sink: Option<FrameSink>,
    ticks: u64,
    outcomes: Vec<SlideOutcome>,
}

impl Preview {
    pub fn new(
        paths: Vec<PathBuf>,
        settings: ActorSettings,
        loader: Arc<dyn LoadDispatch>,
        viewport: Viewport,
    ) -> Self {
        let (completed_tx, completed_rx) = unbounded();
        let (loaded_tx, loaded_rx) = unbounded();
        Self {
            settings,
            loader,
            seed: None,
            viewport,
            pending: paths.into(),
            live: Vec::new(),
            next_id: 0,
            current: None,
            cue: false,
            completed_tx,
            completed_rx,
            loaded_tx,
            loaded_rx,
            canvas: RgbaCanvas::new(viewport),
            sink: None,
            ticks: 0,
            outcomes: Vec::new(),
        }
    }

    /// Derive each actor's motion seed from `seed` and its position.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_frame_sink(mut self, sink: Option<FrameSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn is_done(&self) -> bool {
        self.live.is_empty() && self.pending.is_empty()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn outcomes(&self) -> &[SlideOutcome] {
        &self.outcomes
    }

    pub fn canvas(&self) -> &RgbaCanvas {
        &self.canvas
    }

    /// Change the target size; takes effect on the next tick.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn launch_next(&mut self) -> Result<bool> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(false);
        };
        let id = self.next_id;
        self.next_id += 1;
        let first = self.current.is_none();
        let tx = self.completed_tx.clone();
        let done_path = path.clone();
        let mut builder = ImageActor::builder(path, &self.settings)
            .first_in_queue(first)
            .notify_loaded(self.loaded_tx.clone())
            .on_complete(move || {
                let _ = tx.send(SlideCompleted { id, path: done_path });
            });
        if let Some(seed) = self.seed {
            builder = builder.seed(seed.wrapping_add(id as u64));
        }
        let actor = builder.launch(self.loader.as_ref())?;
        debug!(id, path = %actor.path().display(), first, "launched actor");
        if first {
            self.current = Some(id);
        }
        self.live.push(Slot {
            id,
            actor,
            started: first,
        });
        Ok(true)
    }

    /// Keep one not-yet-started actor loading behind the current one.
    fn ensure_lookahead(&mut self) -> Result<()> {
        if self.current.is_none() {
            self.launch_next()?;
        }
        let current = self.current.unwrap_or(0);
        while !self.live.iter().any(|s| s.id > current) {
            if !self.launch_next()? {
                break;
            }
        }
        Ok(())
    }

    fn any_loading(&self) -> bool {
        self.live
            .iter()
            .any(|s| s.actor.state() == ActorState::Loading)
    }

    /// Block until no live actor is still loading, without ticking.
    ///
    /// With a load timeout configured, gives up after that much wall time and
    /// lets the actor's own tick-counted timeout take over.
    fn wait_for_loads(&self) {
        let deadline = self.settings.load_timeout_ticks.map(|ticks| {
            let per_tick = clock::period_for(self.settings.clock_rate_hz);
            Instant::now() + per_tick.saturating_mul(u32::try_from(ticks).unwrap_or(u32::MAX))
        });
        while self.any_loading() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!("load still pending past its timeout; resuming ticks");
                return;
            }
            match self.loaded_rx.recv_timeout(Duration::from_millis(50)) {
                Ok(path) => debug!(path = %path.display(), "load published"),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    fn drain_completions(&mut self) {
        // load notices only matter while blocked in `wait_for_loads`
        while self.loaded_rx.try_recv().is_ok() {}
        while let Ok(done) = self.completed_rx.try_recv() {
            // Only the playing slide hands over; a slide that failed before
            // its turn is dropped from the line instead.
            if Some(done.id) == self.current {
                info!(id = done.id, path = %done.path.display(), "slide complete");
                self.cue = true;
            }
        }
    }

    fn process_cue(&mut self) {
        if !self.cue {
            return;
        }
        let current = self.current.unwrap_or(0);
        let Some(next) = self.live.iter_mut().find(|s| s.id > current) else {
            if self.pending.is_empty() {
                self.cue = false;
            }
            return;
        };
        // a next slide that is still loading is retried on the next tick
        if next.actor.state() == ActorState::Waiting && next.actor.start_fade_in() {
            next.started = true;
            self.current = Some(next.id);
            self.cue = false;
        }
    }

    fn retire_finished(&mut self) {
        let outcomes = &mut self.outcomes;
        self.live.retain(|s| {
            if !s.actor.is_finished() {
                return true;
            }
            let path = s.actor.path().to_path_buf();
            if s.started && s.actor.image().is_some() {
                outcomes.push(SlideOutcome::Played(path));
            } else {
                warn!(path = %path.display(), "slide skipped");
                outcomes.push(SlideOutcome::Skipped(path));
            }
            false
        });
    }

    /// One clock tick across every live actor, then paint.
    pub fn step(&mut self) -> Result<()> {
        self.advance(false)
    }

    fn advance(&mut self, wait_for_loads: bool) -> Result<()> {
        self.ticks += 1;
        self.drain_completions();
        self.ensure_lookahead()?;
        if wait_for_loads {
            self.wait_for_loads();
        }
        self.process_cue();

        let viewport = self.viewport;
        for slot in &mut self.live {
            slot.actor.tick(viewport);
        }

        self.canvas.resize(viewport);
        let mut painted = false;
        for slot in &self.live {
            painted |= slot.actor.frame().is_some();
            slot.actor.render(&mut self.canvas);
        }
        // blank frames (before the first fade-in, between loads) are not dumped
        if let Some(sink) = &self.sink {
            if painted && self.ticks % sink.every.max(1) == 0 {
                let path = sink.dir.join(format!("frame_{:06}.png", self.ticks));
                self.canvas.save_png(&path)?;
            }
        }

        self.retire_finished();
        Ok(())
    }

    /// Run ticks back-to-back, without the real-time clock.
    ///
    /// Loads are waited for before each tick, so the tick count and the
    /// frames written do not depend on decode speed.
    pub fn run_offline(&mut self) -> Result<()> {
        while !self.is_done() {
            self.advance(true)?;
        }
        info!(ticks = self.ticks, "offline preview finished");
        Ok(())
    }

    /// Run on the fixed-rate clock until done or cancelled.
    pub async fn run_realtime(&mut self, rate_hz: u32, cancel: CancellationToken) -> Result<()> {
        let mut failure = None;
        clock::run(rate_hz, cancel, |_| {
            if let Err(err) = self.step() {
                failure = Some(err);
                return ControlFlow::Break(());
            }
            if self.is_done() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await;
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
