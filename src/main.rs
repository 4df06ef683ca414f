use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use humantime::format_duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use ken_burns::config::Configuration;
use ken_burns::events::SlideOutcome;
use ken_burns::processing::layout::Viewport;
use ken_burns::tasks::clock::period_for;
use ken_burns::tasks::files::collect_images;
use ken_burns::tasks::loader::{ImageCache, ImageLoader};
use ken_burns::tasks::preview::{FrameSink, Preview};

#[derive(Debug, Parser)]
#[command(
    name = "kenburns",
    version,
    about = "Headless Ken Burns slideshow preview"
)]
struct Args {
    /// Path to YAML config; built-in defaults when omitted
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Target area, e.g. 1600x900
    #[arg(long, value_name = "WxH", default_value = "1600x900", value_parser = parse_size)]
    size: Viewport,
    /// Write rendered frames as PNGs into this directory
    #[arg(long = "frames-dir", value_name = "DIR")]
    frames_dir: Option<PathBuf>,
    /// Save every Nth frame
    #[arg(long = "frame-every", value_name = "N", default_value_t = 30)]
    frame_every: u64,
    /// Tick as fast as possible instead of at the configured clock rate
    #[arg(long)]
    offline: bool,
    /// Override seconds-per-image from the config
    #[arg(long, value_name = "SECONDS")]
    seconds: Option<u32>,
    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Image files or directories
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
}

fn parse_size(s: &str) -> Result<Viewport, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {s:?}"))?;
    let width = w.trim().parse().map_err(|e| format!("bad width {w:?}: {e}"))?;
    let height = h.trim().parse().map_err(|e| format!("bad height {h:?}: {e}"))?;
    Ok(Viewport::new(width, height))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("ken_burns={level},kenburns={level}"))),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut cfg = match &args.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(seconds) = args.seconds {
        cfg.seconds_per_image = seconds;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::debug!("configuration:\n{:#?}", cfg);

    let paths = collect_images(&args.paths);
    if paths.is_empty() {
        bail!("no images found under the given paths");
    }
    if let Some(dir) = &args.frames_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating frames directory {}", dir.display()))?;
    }

    let mut settings = cfg.actor_settings();
    if args.offline {
        // wall-clock timeouts mean nothing when ticks are not paced
        settings.load_timeout_ticks = None;
    }
    tracing::info!(
        images = paths.len(),
        per_image = %format_duration(std::time::Duration::from_secs(u64::from(cfg.seconds_per_image))),
        tick = %format_duration(period_for(cfg.clock_rate_hz)),
        size = ?args.size,
        "starting preview"
    );

    let cache = Arc::new(ImageCache::new(cfg.cache_capacity()));
    let loader = Arc::new(ImageLoader::on_runtime(
        tokio::runtime::Handle::current(),
        cache,
    ));
    let sink = args.frames_dir.map(|dir| FrameSink {
        dir,
        every: args.frame_every.max(1),
    });
    let mut preview = Preview::new(paths, settings, loader, args.size)
        .with_seed(cfg.motion_seed)
        .with_frame_sink(sink);

    if args.offline {
        preview.run_offline()?;
    } else {
        let cancel = CancellationToken::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received; stopping");
                    cancel.cancel();
                }
            });
        }
        preview.run_realtime(cfg.clock_rate_hz, cancel).await?;
    }

    let skipped = preview
        .outcomes()
        .iter()
        .filter(|o| matches!(o, SlideOutcome::Skipped(_)))
        .count();
    tracing::info!(
        played = preview.outcomes().len() - skipped,
        skipped,
        ticks = preview.ticks(),
        "preview done"
    );
    Ok(())
}
