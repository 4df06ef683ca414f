use std::path::PathBuf;

/// Sent from an actor's completion callback to whoever sequences slides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideCompleted {
    pub id: usize,
    pub path: PathBuf,
}

/// How a slide ended, as seen by the preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideOutcome {
    Played(PathBuf),
    Skipped(PathBuf),
}
