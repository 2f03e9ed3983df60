//! Proportional-derivative controller for the tracking minigame

use std::time::Instant;

/// Controller gains and limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdGains {
    pub kp: f64,
    pub kd: f64,
    /// Output is clamped to `[-clamp, clamp]`
    pub clamp: f64,
    /// Damping multiplier while the tracker is closing in on the target
    pub approaching_damping: f64,
    /// Damping multiplier while the tracker is moving away or overshooting
    pub chasing_damping: f64,
}

impl Default for PdGains {
    fn default() -> Self {
        Self {
            kp: 0.9,
            kd: 0.3,
            clamp: 1.0,
            approaching_damping: 2.0,
            chasing_damping: 0.5,
        }
    }
}

/// PD controller with directional damping.
///
/// The derivative acts on the tracker's velocity rather than on the error, and uses a
/// stronger damping multiplier while the tracker is already approaching the target.
#[derive(Debug, Clone)]
pub struct PdController {
    gains: PdGains,
    last_error: Option<f64>,
    last_tracker_y: Option<f64>,
    last_sample: Option<Instant>,
}

/// Minimum time between samples for the derivative term, in seconds
const MIN_TIME_DELTA: f64 = 0.001;

impl PdController {
    pub fn new(gains: PdGains) -> Self {
        Self {
            gains,
            last_error: None,
            last_tracker_y: None,
            last_sample: None,
        }
    }

    pub fn gains(&self) -> PdGains {
        self.gains
    }

    pub fn set_gains(&mut self, gains: PdGains) {
        self.gains = gains;
    }

    /// Forget the sample history; the next step has no derivative term
    pub fn reset(&mut self) {
        self.last_error = None;
        self.last_tracker_y = None;
        self.last_sample = None;
    }

    /// Compute the clamped control signal for `error = setpoint - tracker_y`
    pub fn step(&mut self, error: f64, tracker_y: f64, now: Instant) -> f64 {
        let g = self.gains;
        let p = g.kp * error;

        let mut d = 0.0;
        if let (Some(last_error), Some(last_y), Some(last_sample)) =
            (self.last_error, self.last_tracker_y, self.last_sample)
        {
            let dt = now.saturating_duration_since(last_sample).as_secs_f64();
            if dt > MIN_TIME_DELTA {
                let velocity = (tracker_y - last_y) / dt;
                let closing = error.abs() < last_error.abs();
                let toward_target = (velocity > 0.0 && error > 0.0) || (velocity < 0.0 && error < 0.0);
                let damping = if closing && toward_target {
                    g.approaching_damping
                } else {
                    g.chasing_damping
                };
                d = -g.kd * damping * velocity;
            }
        }

        self.last_error = Some(error);
        self.last_tracker_y = Some(tracker_y);
        self.last_sample = Some(now);

        clamp_signal(p + d, g.clamp)
    }
}

fn clamp_signal(signal: f64, limit: f64) -> f64 {
    let limit = limit.abs();
    signal.max(-limit).min(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cold_start_zero_error() {
        let mut pd = PdController::new(PdGains::default());
        assert_eq!(pd.step(0.0, 100.0, Instant::now()), 0.0);
    }

    #[test]
    fn test_proportional_only_when_still() {
        let gains = PdGains {
            kp: 0.1,
            ..PdGains::default()
        };
        let mut pd = PdController::new(gains);
        let t0 = Instant::now();
        assert!((pd.step(4.0, 50.0, t0) - 0.4).abs() < 1e-12);
        // Same tracker position, no velocity
        let s = pd.step(4.0, 50.0, t0 + Duration::from_millis(20));
        assert!((s - 0.4).abs() < 1e-12);
        // Large error saturates
        assert_eq!(pd.step(-40.0, 50.0, t0 + Duration::from_millis(40)), -1.0);
    }

    #[test]
    fn test_approaching_uses_stronger_damping() {
        let gains = PdGains {
            kp: 0.0,
            kd: 1.0,
            clamp: 1000.0,
            approaching_damping: 2.0,
            chasing_damping: 0.5,
        };
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(1);

        // Error shrinks from 10 to 5 while the tracker moves down (+5 px/s), toward the target
        let mut approaching = PdController::new(gains);
        approaching.step(10.0, 0.0, t0);
        assert!((approaching.step(5.0, 5.0, t1) - (-10.0)).abs() < 1e-9);

        // Error grows while the tracker moves away
        let mut chasing = PdController::new(gains);
        chasing.step(5.0, 0.0, t0);
        assert!((chasing.step(10.0, -5.0, t1) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_tiny_time_delta_skips_derivative() {
        let gains = PdGains {
            kp: 0.0,
            kd: 1.0,
            clamp: 10.0,
            ..PdGains::default()
        };
        let mut pd = PdController::new(gains);
        let t0 = Instant::now();
        pd.step(1.0, 0.0, t0);
        assert_eq!(pd.step(1.0, 100.0, t0), 0.0);
    }

    #[test]
    fn test_reset_drops_history() {
        let gains = PdGains {
            kp: 0.0,
            kd: 1.0,
            clamp: 10.0,
            ..PdGains::default()
        };
        let mut pd = PdController::new(gains);
        let t0 = Instant::now();
        pd.step(1.0, 0.0, t0);
        pd.reset();
        assert_eq!(pd.step(1.0, 100.0, t0 + Duration::from_secs(1)), 0.0);
    }

    #[test]
    fn test_output_always_within_clamp() {
        let mut pd = PdController::new(PdGains::default());
        let t0 = Instant::now();
        let samples = [
            (1e9, -1e9),
            (-3.5, 12.0),
            (0.0, 1e12),
            (250.0, -7.0),
            (-1e300, 1e300),
        ];
        for (i, (error, y)) in samples.iter().enumerate() {
            let s = pd.step(*error, *y, t0 + Duration::from_millis(10 * i as u64));
            assert!((-1.0..=1.0).contains(&s), "signal {} out of range", s);
        }
    }
}
