#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use ken_burns::config::ActorSettings;
use ken_burns::error::LoadError;
use ken_burns::tasks::loader::{LoadDispatch, LoadJob};

/// Publishes a solid image before `dispatch` returns.
pub struct Immediate {
    pub width: u32,
    pub height: u32,
}

impl Immediate {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl LoadDispatch for Immediate {
    fn dispatch(&self, job: LoadJob) {
        let img = RgbaImage::from_pixel(self.width, self.height, Rgba([255, 0, 0, 255]));
        job.handoff.publish(Ok(Arc::new(img)));
    }
}

/// Publishes an empty-image error for every job.
pub struct Failing;

impl LoadDispatch for Failing {
    fn dispatch(&self, job: LoadJob) {
        let err = LoadError::EmptyImage(job.path.clone());
        job.handoff.publish(Err(err));
    }
}

/// Holds jobs until the test decides what to do with them.
#[derive(Default)]
pub struct Manual {
    jobs: Mutex<Vec<LoadJob>>,
}

impl Manual {
    pub fn take(&self) -> Vec<LoadJob> {
        std::mem::take(&mut *self.jobs.lock().unwrap())
    }
}

impl LoadDispatch for Manual {
    fn dispatch(&self, job: LoadJob) {
        self.jobs.lock().unwrap().push(job);
    }
}

pub fn settings() -> ActorSettings {
    ActorSettings::default()
}

pub fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
    RgbaImage::from_pixel(width, height, Rgba(color))
        .save(path)
        .unwrap();
}
