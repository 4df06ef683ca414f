/// Callback the caller hands to an actor; runs once, on the clock thread.
pub type OnComplete = Box<dyn FnOnce() + Send + 'static>;

/// Holds the completion callback until it fires. Taking it out of the
/// `Option` is the "already fired" flag.
pub struct Completion {
    callback: Option<OnComplete>,
}

impl Completion {
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Run the callback if it has not run yet. Returns whether it ran.
    pub fn fire(&mut self) -> bool {
        match self.callback.take() {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.callback.is_none()
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("fired", &self.has_fired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fires_at_most_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let mut c = Completion::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!c.has_fired());
        assert!(c.fire());
        assert!(!c.fire());
        assert!(c.has_fired());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
