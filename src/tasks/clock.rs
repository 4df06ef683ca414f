use std::ops::ControlFlow;
use std::time::Duration;

use tokio::select;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::actor::{ActorState, ImageActor};
use crate::processing::layout::Viewport;

pub fn period_for(rate_hz: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1)))
}

/// Fixed-rate tick loop. Ticks run one at a time, in order, on the calling
/// task; a late tick delays the schedule rather than bursting to catch up.
///
/// Stops when `cancel` fires or `on_tick` breaks. Returns the tick count.
pub async fn run<F>(rate_hz: u32, cancel: CancellationToken, mut on_tick: F) -> u64
where
    F: FnMut(u64) -> ControlFlow<()>,
{
    let mut ticker = interval(period_for(rate_hz));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = 0u64;
    loop {
        select! {
            _ = cancel.cancelled() => {
                debug!(ticks, "clock cancelled");
                break;
            }
            _ = ticker.tick() => {
                ticks += 1;
                if on_tick(ticks).is_break() {
                    break;
                }
            }
        }
    }
    ticks
}

/// Tick one actor until it finishes (or `cancel` fires), reading the
/// viewport fresh every tick and calling `redraw` after each one.
pub async fn drive_actor<R>(
    actor: &mut ImageActor,
    rate_hz: u32,
    viewport: watch::Receiver<Viewport>,
    cancel: CancellationToken,
    mut redraw: R,
) -> ActorState
where
    R: FnMut(&ImageActor),
{
    run(rate_hz, cancel, |_| {
        let vp = *viewport.borrow();
        actor.tick(vp);
        redraw(&*actor);
        if actor.is_finished() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .await;
    actor.state()
}
