use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one image actor. Declaration order is the only legal
/// direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ActorState {
    None,
    Loading,
    Init,
    Waiting,
    FadeIn,
    Moving,
    FadeOut,
    Finished,
}

impl ActorState {
    const ALL: [Self; 8] = [
        Self::None,
        Self::Loading,
        Self::Init,
        Self::Waiting,
        Self::FadeIn,
        Self::Moving,
        Self::FadeOut,
        Self::Finished,
    ];

    fn from_u8(raw: u8) -> Self {
        Self::ALL
            .get(usize::from(raw))
            .copied()
            .unwrap_or(Self::Finished)
    }

    /// States in which the image is painted.
    pub fn is_visible(self) -> bool {
        matches!(self, Self::FadeIn | Self::Moving | Self::FadeOut)
    }
}

/// State shared between the clock thread, the load worker and any
/// [`ActorHandle`](super::ActorHandle).
#[derive(Debug)]
pub struct AtomicActorState(AtomicU8);

impl AtomicActorState {
    pub fn new(state: ActorState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ActorState {
        ActorState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `from -> to` if the state is still `from`.
    ///
    /// Writes made before a successful advance are visible to any thread
    /// that subsequently observes `to`. Backward moves are refused.
    pub fn advance(&self, from: ActorState, to: ActorState) -> bool {
        if to <= from {
            return false;
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
