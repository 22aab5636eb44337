// src/main.rs - Runs the tracking pipeline against the simulated rig
use anyhow::{Context, Result};
use clap::Parser;
use man_tracker::pipeline::{AbandonReason, TelemetryOutcome};
use man_tracker::record::SessionRecorder;
use man_tracker::synthetic::SyntheticSensor;
use man_tracker::{DisplayBuffer, FrameOutcome, FrameProcessor, SensorDriver, TrackerConfig};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Locate people in depth-camera frames and stream their positions")]
struct Args {
    /// Config file (JSON). Defaults to the per-user config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many frame notifications; runs until killed when omitted.
    #[arg(short = 'n', long)]
    frames: Option<u64>,

    /// Rate at which the simulated sensor delivers frames.
    #[arg(long, default_value_t = 30.0)]
    sensor_fps: f64,

    /// Save the last displayed frame as PNG on exit.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Record emitted locations to `<dir>/session_<timestamp>/locations.csv`.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Write the effective config to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

#[derive(Debug, Default)]
struct RunStats {
    processed: u64,
    skipped: u64,
    abandoned: u64,
    telemetry_failures: u64,
}

fn main() -> Result<()> {
    // RUST_LOG overrides, e.g. RUST_LOG=man_tracker=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(TrackerConfig::default_path);
    let config = TrackerConfig::load_or_default(&config_path)?;

    if args.write_config {
        config.save(&config_path)?;
        info!("Wrote config to {}", config_path.display());
        return Ok(());
    }

    let mut sensor = SyntheticSensor::kinect_like(args.sensor_fps);
    let geometry = sensor.geometry();
    config.validate_for(geometry)?;
    let display = DisplayBuffer::new(geometry.color);
    let mut processor = FrameProcessor::from_config(&config, geometry, display.clone());
    info!(
        depth = ?geometry.depth,
        color = ?geometry.color,
        max_fps = config.max_fps,
        telemetry = %format!("{}:{}", config.telemetry.host, config.telemetry.port),
        "tracker started"
    );

    let period = Duration::from_secs_f64(1.0 / args.sensor_fps.max(1.0));
    let mut stats = RunStats::default();
    let mut notifications = 0u64;
    let mut recorder = args.record.as_ref().map(|dir| SessionRecorder::new(dir, None));
    let started = Instant::now();
    let mut next = started;

    while args.frames.map_or(true, |limit| notifications < limit) {
        notifications += 1;
        match processor.on_frame_arrived(&mut sensor, Instant::now()) {
            FrameOutcome::Skipped => stats.skipped += 1,
            FrameOutcome::Abandoned(reason) => {
                stats.abandoned += 1;
                if reason == AbandonReason::GeometryMismatch {
                    warn!("sensor geometry changed mid-session");
                }
            }
            FrameOutcome::Processed(report) => {
                stats.processed += 1;
                if let Some(recorder) = recorder.as_mut() {
                    recorder.add_frame(started.elapsed().as_secs_f64(), sensor.frame_index(), &report.locations);
                }
                if !matches!(report.telemetry, TelemetryOutcome::Sent(_)) {
                    stats.telemetry_failures += 1;
                }
                info!(
                    fps = %format!("{:.1}", report.fps),
                    bodies = report.bodies.len(),
                    payload = %report.payload,
                    "frame"
                );
            }
        }

        next += period;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            next = now;
        }
    }

    info!(
        processed = stats.processed,
        skipped = stats.skipped,
        abandoned = stats.abandoned,
        telemetry_failures = stats.telemetry_failures,
        "run finished"
    );

    if let Some(recorder) = &recorder {
        let path = recorder.export_csv()?;
        info!("Recorded {} locations to {}", recorder.len(), path.display());
    }

    if let Some(path) = args.snapshot {
        display
            .snapshot()
            .save(&path)
            .with_context(|| format!("Failed to save snapshot {}", path.display()))?;
        info!("Saved snapshot to {}", path.display());
    }

    Ok(())
}
