// src/pipeline.rs - Per-frame orchestration: throttle, remap, denoise, aggregate, localize, overlay, send
use crate::aggregate::{BodyAggregator, DetectedBody};
use crate::config::TrackerConfig;
use crate::denoise::MaskDenoiser;
use crate::frame::{BodyLabelFrame, DisplayBuffer, FrameGeometry, FrameSet};
use crate::locate::{Localizer, Location};
use crate::mapping::CoordinateRemapper;
use crate::overlay::{self, Overlay};
use crate::sensor::{CannyEdgeDetector, EdgeDetector, SensorDriver, SensorError};
use crate::telemetry::{serialize_locations, Connector, TcpConnector, Telemetry, TelemetryError};
use crate::throttle::{FrameThrottle, ThrottleDecision};
use image::{imageops, Rgba};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// No frame, or one of the three buffers expired before acquisition.
    FrameUnavailable,
    /// The color or depth buffer does not match the session geometry.
    GeometryMismatch,
    MappingFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryOutcome {
    Sent(usize),
    ConnectFailed,
    WriteFailed,
}

#[derive(Debug, Clone, Default)]
pub struct StageTimings {
    pub remap: Duration,
    pub denoise: Duration,
    pub aggregate: Duration,
    pub localize: Duration,
    pub overlay: Duration,
    pub send: Duration,
}

/// What one processed frame produced.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub fps: f64,
    pub bodies: Vec<DetectedBody>,
    pub locations: Vec<Location>,
    pub payload: String,
    pub telemetry: TelemetryOutcome,
    pub timings: StageTimings,
}

#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Skipped,
    Abandoned(AbandonReason),
    Processed(FrameReport),
}

impl FrameOutcome {
    pub fn report(&self) -> Option<&FrameReport> {
        match self {
            FrameOutcome::Processed(report) => Some(report),
            _ => None,
        }
    }
}

/// Runs one frame notification to completion. Owns every per-frame buffer;
/// shares only the display buffer.
pub struct FrameProcessor<C: Connector = TcpConnector> {
    geometry: FrameGeometry,
    throttle: FrameThrottle,
    remapper: CoordinateRemapper,
    denoiser: MaskDenoiser,
    cleaned_labels: BodyLabelFrame,
    aggregator: BodyAggregator,
    localizer: Localizer,
    overlay: Overlay,
    remove_background: bool,
    edge_detector: Option<Box<dyn EdgeDetector + Send>>,
    telemetry: Telemetry<C>,
    display: DisplayBuffer,
    sensor_available: Option<bool>,
}

impl FrameProcessor<TcpConnector> {
    pub fn from_config(config: &TrackerConfig, geometry: FrameGeometry, display: DisplayBuffer) -> Self {
        let connector = TcpConnector::new(
            config.telemetry.host.clone(),
            config.telemetry.port,
            config.telemetry.connect_timeout(),
        );
        Self::with_connector(config, geometry, display, connector)
    }
}

impl<C: Connector> FrameProcessor<C> {
    pub fn with_connector(
        config: &TrackerConfig,
        geometry: FrameGeometry,
        display: DisplayBuffer,
        connector: C,
    ) -> Self {
        let edge_detector: Option<Box<dyn EdgeDetector + Send>> = if config.edges.enabled {
            Some(Box::new(CannyEdgeDetector {
                low_threshold: config.edges.low_threshold,
                high_threshold: config.edges.high_threshold,
            }))
        } else {
            None
        };

        Self {
            geometry,
            throttle: FrameThrottle::new(config.max_fps, Instant::now()),
            remapper: CoordinateRemapper::new(geometry),
            denoiser: MaskDenoiser::new(config.denoise),
            cleaned_labels: BodyLabelFrame::empty(geometry.depth),
            aggregator: BodyAggregator::new(config.body_capacity),
            localizer: Localizer::new(config.focal_length_px, config.camera, config.location_mode),
            overlay: Overlay::new(config.overlay.stroke_width, Rgba(config.overlay.color)),
            remove_background: config.overlay.remove_background,
            edge_detector,
            telemetry: Telemetry::new(connector),
            display,
            sensor_available: None,
        }
    }

    /// Replaces the edge detector; `None` turns highlighting off.
    pub fn set_edge_detector(&mut self, detector: Option<Box<dyn EdgeDetector + Send>>) {
        self.edge_detector = detector;
    }

    /// Restarts the throttle window at `start`, typically the time of the
    /// first notification.
    pub fn reset_throttle(&mut self, max_fps: u32, start: Instant) {
        self.throttle = FrameThrottle::new(max_fps, start);
    }

    pub fn telemetry(&self) -> &Telemetry<C> {
        &self.telemetry
    }

    pub fn display(&self) -> &DisplayBuffer {
        &self.display
    }

    /// Handles one frame-arrival notification.
    pub fn on_frame_arrived(&mut self, driver: &mut dyn SensorDriver, now: Instant) -> FrameOutcome {
        self.track_availability(driver);

        let fps = match self.throttle.check(now) {
            ThrottleDecision::Skip => return FrameOutcome::Skipped,
            ThrottleDecision::Process { fps } => fps,
        };

        let Some(frames) = driver.acquire_frame().and_then(|frame| frame.into_frame_set()) else {
            debug!("frame expired before acquisition");
            return FrameOutcome::Abandoned(AbandonReason::FrameUnavailable);
        };
        self.process(driver, frames, fps)
    }

    fn process(&mut self, driver: &dyn SensorDriver, frames: FrameSet, fps: f64) -> FrameOutcome {
        let FrameSet {
            depth,
            color,
            body_labels,
        } = frames;
        let color_size = (self.geometry.color.width as u32, self.geometry.color.height as u32);
        if depth.size() != self.geometry.depth
            || body_labels.size() != self.geometry.depth
            || color.dimensions() != color_size
        {
            warn!("frame geometry does not match the session, dropping");
            return FrameOutcome::Abandoned(AbandonReason::GeometryMismatch);
        }

        let mut timings = StageTimings::default();

        // Held from remap through overlay; every early return drops it.
        let mut canvas = self.display.lock();

        let started = Instant::now();
        let correspondence = match self.remapper.refresh(driver, &depth) {
            Ok(table) => table,
            Err(e) => {
                log_mapping_failure(&e);
                return FrameOutcome::Abandoned(AbandonReason::MappingFailed);
            }
        };
        timings.remap = started.elapsed();

        imageops::replace(&mut *canvas, &color, 0, 0);
        drop(color);

        let started = Instant::now();
        self.denoiser.denoise_into(&body_labels, &mut self.cleaned_labels);
        timings.denoise = started.elapsed();

        let started = Instant::now();
        self.aggregator.aggregate(correspondence, &self.cleaned_labels);
        let bodies = self.aggregator.detected();
        timings.aggregate = started.elapsed();

        let started = Instant::now();
        let locations = self.localizer.locate_all(&bodies, correspondence, &depth);
        timings.localize = started.elapsed();

        let started = Instant::now();
        if self.remove_background {
            overlay::remove_background(&mut canvas, correspondence, &self.cleaned_labels);
        }
        if let Some(detector) = &self.edge_detector {
            let depth_size = self.geometry.depth;
            let edges = detector.detect(body_labels.as_slice(), depth_size.width, depth_size.height);
            overlay::highlight_edges(&mut canvas, correspondence, &edges);
        }
        self.overlay.draw_rects(&mut canvas, bodies.iter().map(|body| &body.rect));
        drop(canvas);
        timings.overlay = started.elapsed();

        let started = Instant::now();
        let payload = serialize_locations(&locations);
        let telemetry = match self.telemetry.send(&payload) {
            Ok(n) => TelemetryOutcome::Sent(n),
            Err(TelemetryError::Connect { .. }) => TelemetryOutcome::ConnectFailed,
            Err(TelemetryError::Write(_)) => TelemetryOutcome::WriteFailed,
        };
        timings.send = started.elapsed();

        debug!(
            fps,
            bodies = bodies.len(),
            located = locations.len(),
            aggregate_ms = timings.aggregate.as_secs_f64() * 1000.0,
            "frame processed"
        );

        FrameOutcome::Processed(FrameReport {
            fps,
            bodies,
            locations,
            payload,
            telemetry,
            timings,
        })
    }

    fn track_availability(&mut self, driver: &dyn SensorDriver) {
        let available = driver.is_available();
        if self.sensor_available != Some(available) {
            if available {
                info!("sensor running");
            } else {
                warn!("sensor not available");
            }
            self.sensor_available = Some(available);
        }
    }
}

fn log_mapping_failure(e: &SensorError) {
    warn!("coordinate mapping failed, abandoning frame: {e}");
}
