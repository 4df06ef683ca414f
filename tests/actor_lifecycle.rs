mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{Failing, Immediate, Manual, settings, write_png};
use ken_burns::config::{ActorSettings, Band, MotionOptions};
use ken_burns::error::LoadError;
use ken_burns::processing::layout::Viewport;
use ken_burns::processing::motion::{EasedAxis, MotionController};
use ken_burns::render::canvas::{Canvas, RgbaCanvas};
use ken_burns::tasks::loader::{ImageCache, ImageLoader};
use ken_burns::{ActorState, ImageActor};

const VIEW: Viewport = Viewport::new(1600, 900);

fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
    let hits = Arc::new(AtomicUsize::new(0));
    let c = hits.clone();
    (hits, move || {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn first_actor_runs_full_lifecycle_with_exact_phase_lengths() {
    let (fired, on_complete) = counter();
    let mut actor = ImageActor::builder("a.jpg", &settings())
        .first_in_queue(true)
        .seed(11)
        .on_complete(on_complete)
        .launch(&Immediate::new(320, 180))
        .unwrap();
    assert_eq!(actor.state(), ActorState::Init);

    let mut per_state: BTreeMap<ActorState, u64> = BTreeMap::new();
    let mut prev = actor.state();
    let mut fired_at = None;
    let mut ticks = 0u64;
    while !actor.is_finished() {
        ticks += 1;
        assert!(ticks < 10_000, "actor never finished");
        let before = actor.state();
        *per_state.entry(before).or_default() += 1;
        let after = actor.tick(VIEW);
        assert!(after >= prev, "state went backwards: {prev:?} -> {after:?}");
        if before == ActorState::FadeIn && after == ActorState::Moving {
            assert_eq!(actor.remaining_ticks(), 300);
        }
        assert!((0.0..=1.0).contains(&actor.alpha()));
        if fired.load(Ordering::SeqCst) == 1 && fired_at.is_none() {
            fired_at = Some((before, after));
        }
        prev = after;
    }

    assert_eq!(per_state.get(&ActorState::Init), Some(&1));
    assert_eq!(per_state.get(&ActorState::Waiting), None);
    assert_eq!(per_state.get(&ActorState::FadeIn), Some(&100));
    assert_eq!(per_state.get(&ActorState::Moving), Some(&300));
    assert_eq!(per_state.get(&ActorState::FadeOut), Some(&100));
    assert_eq!(fired_at, Some((ActorState::Moving, ActorState::FadeOut)));
    assert_eq!(actor.alpha(), 0.0);

    for _ in 0..10 {
        assert_eq!(actor.tick(VIEW), ActorState::Finished);
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn alpha_is_monotonic_within_each_fade() {
    let mut actor = ImageActor::builder("a.jpg", &settings())
        .first_in_queue(true)
        .seed(2)
        .launch(&Immediate::new(64, 64))
        .unwrap();
    let mut last = 0.0f32;
    while !actor.is_finished() {
        let before = actor.state();
        actor.tick(VIEW);
        let alpha = actor.alpha();
        match before {
            ActorState::FadeIn => assert!(alpha > last),
            ActorState::Moving => assert_eq!(alpha, 1.0),
            ActorState::FadeOut => assert!(alpha < last),
            _ => assert_eq!(alpha, 0.0),
        }
        last = alpha;
    }
}

#[test]
fn second_actor_waits_until_cued() {
    let loader = Manual::default();
    let mut actor = ImageActor::builder("b.jpg", &settings())
        .seed(5)
        .launch(&loader)
        .unwrap();
    let handle = actor.handle();

    assert_eq!(actor.state(), ActorState::Loading);
    assert!(!handle.start_fade_in(), "cue while loading must be ignored");

    for job in loader.take() {
        assert!(job.handoff.publish(Ok(Arc::new(image::RgbaImage::new(40, 30)))));
    }
    assert_eq!(actor.tick(VIEW), ActorState::Waiting);
    for _ in 0..250 {
        assert_eq!(actor.tick(VIEW), ActorState::Waiting);
        assert_eq!(actor.alpha(), 0.0);
        assert!(actor.frame().is_none());
    }

    assert_eq!(handle.state(), ActorState::Waiting);
    assert!(handle.start_fade_in());
    assert!(!handle.start_fade_in(), "second cue must be a no-op");
    assert!(!handle.is_finished());
    assert_eq!(actor.tick(VIEW), ActorState::FadeIn);
    assert!(actor.frame().is_some());
}

#[test]
fn failed_load_skips_straight_to_finished() {
    let (fired, on_complete) = counter();
    let mut actor = ImageActor::builder("broken.jpg", &settings())
        .first_in_queue(true)
        .on_complete(on_complete)
        .launch(&Failing)
        .unwrap();

    assert_eq!(actor.tick(VIEW), ActorState::Finished);
    assert!(actor.image().is_none());
    assert!(actor.frame().is_none());
    for _ in 0..5 {
        actor.tick(VIEW);
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn load_timeout_gives_up_and_ignores_late_result() {
    let loader = Manual::default();
    let (fired, on_complete) = counter();
    let settings = ActorSettings {
        load_timeout_ticks: Some(5),
        ..settings()
    };
    let mut actor = ImageActor::builder("slow.jpg", &settings)
        .on_complete(on_complete)
        .launch(&loader)
        .unwrap();

    for _ in 0..4 {
        assert_eq!(actor.tick(VIEW), ActorState::Loading);
    }
    assert_eq!(actor.tick(VIEW), ActorState::Finished);
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let jobs = loader.take();
    assert_eq!(jobs.len(), 1);
    for job in jobs {
        assert!(!job.handoff.publish(Ok(Arc::new(image::RgbaImage::new(4, 4)))));
    }
    assert_eq!(actor.tick(VIEW), ActorState::Finished);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn dropped_handoff_counts_as_failure() {
    let loader = Manual::default();
    let (fired, on_complete) = counter();
    let mut actor = ImageActor::builder("lost.jpg", &settings())
        .on_complete(on_complete)
        .launch(&loader)
        .unwrap();

    drop(loader.take());
    assert_eq!(actor.state(), ActorState::Init);
    assert_eq!(actor.tick(VIEW), ActorState::Finished);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn inverted_band_is_rejected_at_launch() {
    let mut settings = settings();
    settings.motion.pan_band = Band::new(0.9, 0.1);
    let loader = Manual::default();
    let err = ImageActor::builder("a.jpg", &settings)
        .launch(&loader)
        .unwrap_err();
    assert!(format!("{err:#}").contains("pan-band"), "{err:#}");
    assert!(loader.take().is_empty(), "no load is dispatched");

    let zero_rate = ActorSettings {
        clock_rate_hz: 0,
        ..common::settings()
    };
    assert!(ImageActor::builder("a.jpg", &zero_rate).launch(&loader).is_err());
}

#[test]
fn abandoned_error_names_the_path() {
    let err = LoadError::Abandoned("x/y.png".into());
    assert!(err.to_string().contains("x/y.png"));
}

#[test]
fn degenerate_viewport_paints_nothing() {
    let mut actor = ImageActor::builder("a.jpg", &settings())
        .first_in_queue(true)
        .seed(1)
        .launch(&Immediate::new(32, 32))
        .unwrap();
    let empty = Viewport::new(0, 0);
    let mut canvas = RgbaCanvas::new(empty);

    actor.tick(empty);
    for _ in 0..5 {
        assert_eq!(actor.tick(empty), ActorState::FadeIn);
        assert!(actor.frame().is_none());
        actor.render(&mut canvas);
    }

    actor.tick(VIEW);
    assert!(actor.frame().is_some());
}

#[test]
fn unzoomed_centred_image_is_letterboxed() {
    let opts = MotionOptions::default();
    let mut motion = MotionController::from_axes(
        &opts,
        EasedAxis::new(1.0, 0.0),
        EasedAxis::new(0.5, 0.0),
        EasedAxis::new(0.5, 0.0),
    );
    let rect = motion.step(VIEW, 3200, 900).unwrap();
    assert!((rect.x - 0.0).abs() < 1e-3);
    assert!((rect.w - 1600.0).abs() < 1e-3);
    assert!((rect.h - 450.0).abs() < 1e-3);
    assert!((rect.y - 225.0).abs() < 1e-3);

    let rect = motion.step(VIEW, 1600, 900).unwrap();
    assert!((rect.x).abs() < 1e-3 && (rect.y).abs() < 1e-3);
    assert!((rect.w - 1600.0).abs() < 1e-3 && (rect.h - 900.0).abs() < 1e-3);
}

#[test]
fn zoom_reverses_softly_at_upper_edge() {
    let opts = MotionOptions::default();
    let speed = opts.zoom_speed;
    let mut motion = MotionController::from_axes(
        &opts,
        EasedAxis::new(opts.zoom_band.max - 0.001, speed),
        EasedAxis::new(0.5, 0.0),
        EasedAxis::new(0.5, 0.0),
    );

    let mut armed = false;
    let mut peak = 0.0f32;
    let mut last_v = speed;
    for _ in 0..5_000 {
        motion.step(VIEW, 1200, 800);
        let z = motion.zoom();
        armed |= z.reversing;
        peak = peak.max(z.value);
        assert!((z.velocity - last_v).abs() <= speed * opts.easing * 2.0 + 1e-7);
        last_v = z.velocity;
        if armed && !z.reversing {
            break;
        }
    }
    assert!(armed);
    assert!(peak > opts.zoom_band.max);
    assert!(peak < opts.zoom_band.max + 50.0 * speed);
    assert_eq!(motion.zoom().velocity, -speed);
}

#[test]
fn renders_onto_rgba_canvas_once_visible() {
    let mut actor = ImageActor::builder("a.jpg", &settings())
        .first_in_queue(true)
        .seed(9)
        .launch(&Immediate::new(16, 9))
        .unwrap();
    let view = Viewport::new(32, 18);
    let mut canvas = RgbaCanvas::new(view);

    actor.tick(view);
    actor.render(&mut canvas);
    assert!(canvas.as_image().pixels().all(|p| p.0 == [0, 0, 0, 255]));

    while actor.state() != ActorState::Moving {
        actor.tick(view);
    }
    canvas.resize(view);
    actor.render(&mut canvas);
    assert_eq!(canvas.viewport(), view);
    assert_eq!(canvas.as_image().get_pixel(16, 9).0, [255, 0, 0, 255]);
}

#[test]
fn threaded_loader_decodes_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("real.png");
    write_png(&path, 30, 20, [0, 255, 0, 255]);

    let cache = Arc::new(ImageCache::new(std::num::NonZeroUsize::new(2).unwrap()));
    let loader = ImageLoader::threaded(cache.clone());
    let mut actor = ImageActor::builder(&path, &settings())
        .first_in_queue(true)
        .launch(&loader)
        .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while actor.state() == ActorState::Loading {
        assert!(std::time::Instant::now() < deadline, "load never completed");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(actor.tick(VIEW), ActorState::FadeIn);
    assert_eq!(actor.image().unwrap().dimensions(), (30, 20));
    assert_eq!(cache.len(), 1);
}
