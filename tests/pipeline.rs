// tests/pipeline.rs - Whole-pipeline behavior against a scripted sensor
use approx::assert_relative_eq;
use image::{Rgba, RgbaImage};
use man_tracker::frame::{BodyLabelFrame, DepthFrame, MultiSourceFrame};
use man_tracker::locate::{Location, LocationMode};
use man_tracker::mapping::SpacePoint;
use man_tracker::overlay::EDGE_COLOR;
use man_tracker::pipeline::{AbandonReason, TelemetryOutcome};
use man_tracker::sensor::{EdgeDetector, SensorError};
use man_tracker::{DisplayBuffer, FrameGeometry, FrameOutcome, FrameProcessor, FrameSize, SensorDriver, TrackerConfig};
use std::collections::VecDeque;
use std::io::Read;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const SIZE: FrameSize = FrameSize { width: 40, height: 30 };
const GRAY: Rgba<u8> = Rgba([90, 90, 90, 255]);

/// Depth and color share one resolution and map onto each other one to one.
struct ScriptedSensor {
    frames: VecDeque<MultiSourceFrame>,
    failing_maps: usize,
}

impl ScriptedSensor {
    fn new(frames: impl IntoIterator<Item = MultiSourceFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            failing_maps: 0,
        }
    }

    fn identity(out: &mut [SpacePoint]) {
        for (i, point) in out.iter_mut().enumerate() {
            *point = SpacePoint::new((i % SIZE.width) as f32, (i / SIZE.width) as f32);
        }
    }
}

impl SensorDriver for ScriptedSensor {
    fn geometry(&self) -> FrameGeometry {
        FrameGeometry { depth: SIZE, color: SIZE }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn acquire_frame(&mut self) -> Option<MultiSourceFrame> {
        self.frames.pop_front()
    }

    fn map_color_to_depth(&self, _depth: &DepthFrame, out: &mut [SpacePoint]) -> Result<(), SensorError> {
        if self.failing_maps > 0 {
            return Err(SensorError::Mapping("scripted".to_string()));
        }
        Self::identity(out);
        Ok(())
    }

    fn map_depth_to_color(&self, _depth: &DepthFrame, out: &mut [SpacePoint]) -> Result<(), SensorError> {
        Self::identity(out);
        Ok(())
    }
}

// Body in slot 2 covering columns 10..=19 and rows 8..=21 at 3 m.
fn person_frame() -> MultiSourceFrame {
    let mut depth = DepthFrame::filled(SIZE, 4000);
    let mut labels = BodyLabelFrame::empty(SIZE);
    for y in 8..=21 {
        for x in 10..=19 {
            depth.set(x, y, 3000);
            labels.set(x, y, 2);
        }
    }
    let color = RgbaImage::from_pixel(SIZE.width as u32, SIZE.height as u32, GRAY);
    MultiSourceFrame::complete(depth, color, labels)
}

fn config() -> TrackerConfig {
    let mut config = TrackerConfig::default();
    config.overlay.stroke_width = 2;
    // Nothing listens on the default port during tests.
    config.telemetry.connect_timeout_ms = 50;
    config
}

fn processor(config: &TrackerConfig, start: Instant) -> FrameProcessor {
    let geometry = FrameGeometry { depth: SIZE, color: SIZE };
    let mut processor = FrameProcessor::from_config(config, geometry, DisplayBuffer::new(SIZE));
    processor.reset_throttle(config.max_fps, start);
    processor
}

fn at(start: Instant, ms: u64) -> Instant {
    start + Duration::from_millis(ms)
}

#[test]
fn locates_person_and_draws_box() {
    let t0 = Instant::now();
    let mut processor = processor(&config(), t0);
    let mut sensor = ScriptedSensor::new([person_frame()]);

    let outcome = processor.on_frame_arrived(&mut sensor, at(t0, 70));
    let report = outcome.report().expect("processed");
    assert_eq!(report.bodies.len(), 1);
    assert_eq!(report.bodies[0].slot, 2);
    assert_eq!(
        (report.bodies[0].rect.top, report.bodies[0].rect.bottom, report.bodies[0].rect.left, report.bodies[0].rect.right),
        (8, 21, 10, 19)
    );
    // center (14, 14) is 6 px left of the optical center at x = 20
    assert_eq!(report.locations, vec![Location::relative(3.0, -6.0)]);
    assert_eq!(report.payload, "3.00:-6.00;");

    let shown = processor.display().snapshot();
    assert_eq!(*shown.get_pixel(14, 8), Rgba([0, 0, 255, 255]));
    assert_eq!(*shown.get_pixel(14, 14), GRAY);
    assert_eq!(*shown.get_pixel(2, 2), GRAY);
}

#[test]
fn throttle_drops_early_notifications() {
    let t0 = Instant::now();
    let mut processor = processor(&config(), t0);
    let mut sensor = ScriptedSensor::new([person_frame(), person_frame()]);

    assert!(matches!(processor.on_frame_arrived(&mut sensor, at(t0, 40)), FrameOutcome::Skipped));
    assert_eq!(sensor.frames.len(), 2);
    assert!(processor.on_frame_arrived(&mut sensor, at(t0, 70)).report().is_some());
    assert!(matches!(processor.on_frame_arrived(&mut sensor, at(t0, 100)), FrameOutcome::Skipped));
    assert!(processor.on_frame_arrived(&mut sensor, at(t0, 140)).report().is_some());
}

#[test]
fn abandoned_frames_release_the_display() {
    let t0 = Instant::now();
    let mut processor = processor(&config(), t0);
    let mut missing_labels = person_frame();
    missing_labels.body_labels = None;
    let mut sensor = ScriptedSensor::new([missing_labels, person_frame(), person_frame()]);

    let outcome = processor.on_frame_arrived(&mut sensor, at(t0, 100));
    assert!(matches!(outcome, FrameOutcome::Abandoned(AbandonReason::FrameUnavailable)));
    assert!(!processor.display().try_is_locked());

    sensor.failing_maps = 1;
    let outcome = processor.on_frame_arrived(&mut sensor, at(t0, 200));
    assert!(matches!(outcome, FrameOutcome::Abandoned(AbandonReason::MappingFailed)));
    assert!(!processor.display().try_is_locked());

    sensor.failing_maps = 0;
    assert!(processor.on_frame_arrived(&mut sensor, at(t0, 300)).report().is_some());
}

#[test]
fn nothing_detected_sends_empty_payload() {
    let t0 = Instant::now();
    let mut processor = processor(&config(), t0);
    let mut frame = person_frame();
    frame.body_labels = Some(BodyLabelFrame::empty(SIZE));
    let mut sensor = ScriptedSensor::new([frame]);

    let outcome = processor.on_frame_arrived(&mut sensor, at(t0, 100));
    let report = outcome.report().expect("processed");
    assert!(report.bodies.is_empty());
    assert!(report.locations.is_empty());
    assert_eq!(report.payload, "");
}

#[test]
fn zero_depth_at_center_skips_the_body() {
    let t0 = Instant::now();
    let mut processor = processor(&config(), t0);
    let mut frame = person_frame();
    if let Some(depth) = frame.depth.as_mut() {
        depth.set(14, 14, 0);
    }
    let mut sensor = ScriptedSensor::new([frame]);

    let outcome = processor.on_frame_arrived(&mut sensor, at(t0, 100));
    let report = outcome.report().expect("processed");
    assert_eq!(report.bodies.len(), 1);
    assert!(report.locations.is_empty());
}

#[test]
fn absolute_mode_emits_world_coordinates() {
    let t0 = Instant::now();
    let mut config = config();
    config.location_mode = LocationMode::Absolute;
    let mut processor = processor(&config, t0);
    let mut sensor = ScriptedSensor::new([person_frame()]);

    let outcome = processor.on_frame_arrived(&mut sensor, at(t0, 100));
    let report = outcome.report().expect("processed");
    let [Location::Absolute(p)] = report.locations.as_slice() else {
        panic!("expected one absolute location, got {:?}", report.locations);
    };
    // screen offsets (-6, -1) at 3 m
    let f = config.focal_length_px;
    assert_relative_eq!(p.x, 3.0, epsilon = 1e-12);
    assert_relative_eq!(p.y, 6.0 * 3.0 / f, epsilon = 1e-12);
    assert_relative_eq!(p.z, 3.0 / f, epsilon = 1e-12);
    assert_eq!(report.payload.matches(';').count(), 1);
    assert_eq!(report.payload.matches(':').count(), 2);
}

struct MarkOne(usize, usize);

impl EdgeDetector for MarkOne {
    fn detect(&self, _gray: &[u8], width: usize, height: usize) -> Vec<u8> {
        let mut mask = vec![0; width * height];
        mask[self.1 * width + self.0] = 255;
        mask
    }
}

#[test]
fn edge_highlight_and_background_removal() {
    let t0 = Instant::now();
    let mut config = config();
    config.overlay.remove_background = true;
    let mut processor = processor(&config, t0);
    processor.set_edge_detector(Some(Box::new(MarkOne(30, 25))));
    let mut sensor = ScriptedSensor::new([person_frame()]);

    assert!(processor.on_frame_arrived(&mut sensor, at(t0, 100)).report().is_some());
    let shown = processor.display().snapshot();
    assert_eq!(*shown.get_pixel(2, 2), Rgba([0, 0, 0, 0]));
    assert_eq!(*shown.get_pixel(14, 14), GRAY);
    assert_eq!(*shown.get_pixel(30, 25), EDGE_COLOR);
}

struct Capture(Arc<Mutex<Vec<u8>>>);

impl EdgeDetector for Capture {
    fn detect(&self, gray: &[u8], width: usize, height: usize) -> Vec<u8> {
        *self.0.lock().unwrap() = gray.to_vec();
        vec![0; width * height]
    }
}

#[test]
fn edges_are_detected_on_the_raw_label_buffer() {
    let t0 = Instant::now();
    let mut processor = processor(&config(), t0);
    let seen = Arc::new(Mutex::new(Vec::new()));
    processor.set_edge_detector(Some(Box::new(Capture(seen.clone()))));

    // A lone labelled pixel the median filter would erase.
    let mut frame = person_frame();
    if let Some(labels) = frame.body_labels.as_mut() {
        labels.set(30, 3, 2);
    }
    let mut sensor = ScriptedSensor::new([frame]);

    let outcome = processor.on_frame_arrived(&mut sensor, at(t0, 100));
    let report = outcome.report().expect("processed");
    assert_eq!(report.bodies[0].rect.right, 19);

    let gray = seen.lock().unwrap().clone();
    assert_eq!(gray.len(), SIZE.len());
    assert_eq!(gray[SIZE.index(30, 3)], 2);
    assert_eq!(gray[SIZE.index(10, 8)], 2);
}

#[test]
fn telemetry_reaches_listener_and_survives_refusal() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = config();
    config.telemetry.port = listener.local_addr().unwrap().port();

    let t0 = Instant::now();
    let mut processor = processor(&config, t0);
    let mut sensor = ScriptedSensor::new([person_frame(), person_frame()]);

    for ms in [100, 200] {
        let outcome = processor.on_frame_arrived(&mut sensor, at(t0, ms));
        assert_eq!(outcome.report().map(|r| r.telemetry), Some(TelemetryOutcome::Sent(11)));
    }
    let (mut peer, _) = listener.accept().unwrap();
    drop(processor);
    let mut received = String::new();
    peer.read_to_string(&mut received).unwrap();
    assert_eq!(received, "3.00:-6.00;3.00:-6.00;");

    // Listener gone: the frame still completes, only the send is reported.
    drop(listener);
    let mut processor = self::processor(&config, t0);
    let mut sensor = ScriptedSensor::new([person_frame()]);
    let outcome = processor.on_frame_arrived(&mut sensor, at(t0, 100));
    let report = outcome.report().expect("processed");
    assert_eq!(report.telemetry, TelemetryOutcome::ConnectFailed);
    assert_eq!(report.locations.len(), 1);
}
