// src/throttle.rs - Soft frame-rate cap
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThrottleDecision {
    /// Process this frame. `fps` is the instantaneous rate since the previous
    /// accepted frame.
    Process { fps: f64 },
    Skip,
}

/// Drops frames that arrive sooner than `1000 / max_fps` ms after the last
/// accepted one. Never waits.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    last_accepted: Instant,
}

impl FrameThrottle {
    pub fn new(max_fps: u32, start: Instant) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(1.0 / f64::from(max_fps.max(1))),
            last_accepted: start,
        }
    }

    pub fn check(&mut self, now: Instant) -> ThrottleDecision {
        let elapsed = now.saturating_duration_since(self.last_accepted);
        if elapsed < self.min_interval {
            return ThrottleDecision::Skip;
        }
        self.last_accepted = now;
        ThrottleDecision::Process {
            fps: 1.0 / elapsed.as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn skips_inside_period_and_accepts_after() {
        let t = Instant::now();
        let mut throttle = FrameThrottle::new(15, t);

        assert_eq!(throttle.check(t + Duration::from_millis(40)), ThrottleDecision::Skip);
        match throttle.check(t + Duration::from_millis(70)) {
            ThrottleDecision::Process { fps } => assert_relative_eq!(fps, 1000.0 / 70.0, epsilon = 1e-9),
            ThrottleDecision::Skip => panic!("frame at T+70ms should be accepted"),
        }
    }

    #[test]
    fn skipped_frames_do_not_move_the_reference() {
        let t = Instant::now();
        let mut throttle = FrameThrottle::new(15, t);
        for ms in [10, 20, 30, 40, 50, 60] {
            assert_eq!(throttle.check(t + Duration::from_millis(ms)), ThrottleDecision::Skip);
        }
        assert!(matches!(
            throttle.check(t + Duration::from_millis(67)),
            ThrottleDecision::Process { .. }
        ));
        // The reference is now T+67ms.
        assert_eq!(throttle.check(t + Duration::from_millis(100)), ThrottleDecision::Skip);
    }
}
