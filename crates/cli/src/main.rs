use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::Parser;
use loop_engine::sim::SimulatedPlayer;
use loop_engine::{
    IntervalClock, LoopConfig, LoopController, LoopErrorKind, LoopEvent, LoopMode, MediaHandle,
    ProbedMedia, TimePosition,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Ticks spent sweeping the handles from the full span to the requested range.
const DRAG_TICKS: u32 = 30;
const LOAD_POLL: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command(name = "cliploop")]
#[command(about = "Headless looping preview of a trimmed media clip")]
struct Cli {
    /// Media file to preview.
    media: PathBuf,

    /// JSON config file with loop tuning.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Longest confirmable selection in seconds.
    #[arg(long)]
    max_selection: Option<f64>,

    /// Selection start the handles are dragged to, in seconds.
    #[arg(long)]
    start: Option<f64>,

    /// Selection end the handles are dragged to, in seconds.
    #[arg(long)]
    end: Option<f64>,

    /// Wall-clock seconds to keep the preview running.
    #[arg(long, default_value = "3.0")]
    run_secs: f64,

    /// Seconds to wait for the media duration.
    #[arg(long, default_value = "10.0")]
    load_timeout: f64,
}

type Controller = LoopController<SimulatedPlayer, IntervalClock>;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let (clock, ticks) = IntervalClock::channel();
    let media = ProbedMedia::new(cli.media.clone());
    let mut controller = LoopController::new(SimulatedPlayer::default(), clock, config);

    controller.attach(Arc::new(media.clone()));
    wait_for_duration(&mut controller, &media, secs_to_duration(cli.load_timeout)?)?;
    if let Some(aspect) = controller.natural_aspect() {
        info!(
            width = aspect.width,
            height = aspect.height,
            ratio = aspect.ratio(),
            "natural aspect"
        );
    }

    let duration = media
        .duration()
        .context("duration vanished after resolution")?;
    let target = drag_target(&cli, duration);
    let handles = controller.handles();
    let interval = controller.config().tick_interval();
    let deadline = Instant::now() + secs_to_duration(cli.run_secs)?;
    let mut tick_count = 0_u32;

    while Instant::now() < deadline {
        match ticks.recv_timeout(Duration::from_secs(1)) {
            Ok(tick) => debug!(seq = tick.seq, "clock tick"),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => bail!("clock thread stopped"),
        }

        if let Some((start, end)) = target {
            if tick_count <= DRAG_TICKS {
                let progress = f64::from(tick_count) / f64::from(DRAG_TICKS);
                handles.publish(
                    lerp(TimePosition::ZERO, start, progress),
                    lerp(duration, end, progress),
                );
            }
        }
        tick_count = tick_count.saturating_add(1);

        let fired = controller.engine_mut().advance(interval);
        for generation in fired {
            log_events(&controller.on_engine_fired(generation));
        }
        log_events(&controller.sample_tick()?);
    }

    report(&controller)?;
    controller.detach();
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config(cli: &Cli) -> anyhow::Result<LoopConfig> {
    let mut config = match &cli.config {
        Some(path) => LoopConfig::load(path)?,
        None => LoopConfig::default(),
    };
    if let Some(seconds) = cli.max_selection {
        config.max_selection_tl = TimePosition::from_seconds(seconds).ticks();
        config.validate()?;
    }
    Ok(config)
}

fn wait_for_duration(
    controller: &mut Controller,
    media: &ProbedMedia,
    timeout: Duration,
) -> anyhow::Result<()> {
    let started = Instant::now();
    loop {
        log_events(&controller.poll_duration()?);
        if controller.mode() != Some(LoopMode::AwaitingDuration) {
            break;
        }
        if let Some(message) = media.load_error() {
            bail!("failed to load {}: {message}", media.path().display());
        }
        if started.elapsed() >= timeout {
            bail!(
                "timed out after {:.1}s waiting for the duration of {}",
                timeout.as_secs_f64(),
                media.path().display()
            );
        }
        thread::sleep(LOAD_POLL);
    }

    if let Some(duration) = media.duration() {
        controller.engine_mut().set_duration(duration);
    }
    Ok(())
}

/// Final handle positions for the scripted drag, when any were requested.
fn drag_target(cli: &Cli, duration: TimePosition) -> Option<(TimePosition, TimePosition)> {
    if cli.start.is_none() && cli.end.is_none() {
        return None;
    }
    let start = cli
        .start
        .map_or(TimePosition::ZERO, TimePosition::from_seconds);
    let end = cli.end.map_or(duration, TimePosition::from_seconds);
    Some((start, end))
}

fn lerp(from: TimePosition, to: TimePosition, progress: f64) -> TimePosition {
    let from_ticks = from.ticks() as f64;
    let to_ticks = to.ticks() as f64;
    TimePosition::from_ticks((from_ticks + (to_ticks - from_ticks) * progress).round() as i64)
}

fn secs_to_duration(seconds: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(seconds).with_context(|| format!("invalid seconds value {seconds}"))
}

fn log_events(events: &[LoopEvent]) {
    for event in events {
        match event {
            LoopEvent::PositionChanged { .. } => {}
            LoopEvent::ModeChanged { from, to } => info!(%from, %to, "mode changed"),
            LoopEvent::LoopRestarted { to } => debug!(%to, "loop restarted"),
            other => debug!(?other, "loop event"),
        }
    }
}

fn report(controller: &Controller) -> anyhow::Result<()> {
    let max = controller.config().max_selection();
    let validity = controller.current_validity();
    info!(label = %validity.label(max), valid = validity.is_valid, "selection length");

    let output = match controller.confirm_selection() {
        Ok(selection) => serde_json::json!({ "confirmed": selection }),
        Err(error) if LoopErrorKind::from(&error).is_user_correctable() => {
            warn!(%error, "selection cannot be confirmed");
            serde_json::json!({ "snapshot": controller.snapshot() })
        }
        Err(error) => return Err(error.into()),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
