//! Filtering of raw device motion before it becomes a counter write.

/// Minimum `|x| + |y| + |z|` acceleration counted as a shake.
pub const SHAKE_THRESHOLD: f64 = 15.0;
/// Minimum gap between two accepted shakes.
pub const SHAKE_DEBOUNCE_MS: i64 = 250;
/// Highest value the shake counter can reach.
pub const SHAKE_CAP: u32 = 500;

/// One accelerometer sample, gravity excluded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acceleration {
    /// m/s² along the device's x axis.
    pub x: f64,
    /// m/s² along the device's y axis.
    pub y: f64,
    /// m/s² along the device's z axis.
    pub z: f64,
}

impl Acceleration {
    /// Sum of the per-axis magnitudes.
    pub fn magnitude(self) -> f64 {
        self.x.abs() + self.y.abs() + self.z.abs()
    }
}

/// Debounces shake samples into a capped counter.
#[derive(Debug, Clone, Default)]
pub struct ShakeDetector {
    last_accepted_ms: Option<i64>,
}

impl ShakeDetector {
    /// Feed one sample taken at `at_ms`. Returns the next counter value when
    /// the sample counts as a new shake.
    pub fn register(&mut self, current: u32, sample: Acceleration, at_ms: i64) -> Option<u32> {
        if sample.magnitude() <= SHAKE_THRESHOLD || current >= SHAKE_CAP {
            return None;
        }
        if self
            .last_accepted_ms
            .is_some_and(|last| at_ms - last < SHAKE_DEBOUNCE_MS)
        {
            return None;
        }
        self.last_accepted_ms = Some(at_ms);
        Some(current + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARD: Acceleration = Acceleration {
        x: 9.0,
        y: -8.0,
        z: 1.0,
    };

    #[test]
    fn gentle_motion_is_not_a_shake() {
        let mut detector = ShakeDetector::default();
        let gentle = Acceleration {
            x: 5.0,
            y: 5.0,
            z: 5.0,
        };
        assert_eq!(detector.register(0, gentle, 0), None);
        assert_eq!(detector.register(0, HARD, 10), Some(1));
    }

    #[test]
    fn bursts_count_once_per_interval() {
        let mut detector = ShakeDetector::default();
        let mut count = 0;
        for at in (0..1_000).step_by(20) {
            if let Some(next) = detector.register(count, HARD, at) {
                count = next;
            }
        }
        // Accepted at 0, 260, 520 and 780.
        assert_eq!(count, 4);
    }

    #[test]
    fn counter_never_passes_the_cap() {
        let mut detector = ShakeDetector::default();
        let mut count = SHAKE_CAP - 2;
        for step in 0..10 {
            if let Some(next) = detector.register(count, HARD, step * SHAKE_DEBOUNCE_MS) {
                count = next;
            }
        }
        assert_eq!(count, SHAKE_CAP);
    }
}
