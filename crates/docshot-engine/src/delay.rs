//! Pacing for the scripted credential flow.
//!
//! Login providers key bot heuristics off inhumanly regular timing, so the
//! interactive flow paces its steps and parks the pointer before the first
//! keystroke. The policy is injectable; tests use [`NoDelays`].

use rand::Rng;
use std::time::Duration;

pub trait DelayPolicy: Send + Sync {
    /// Pause inserted between scripted credential steps.
    fn step_pause(&self) -> Duration;

    /// Where to move the pointer before typing starts.
    fn pointer_start(&self) -> (f64, f64);
}

/// Uniformly random pacing within a band, defaulting to 500-2500 ms.
#[derive(Debug, Clone)]
pub struct HumanLikeDelays {
    pub min: Duration,
    pub max: Duration,
    /// The pointer lands somewhere inside this area (width, height).
    pub pointer_area: (f64, f64),
}

impl Default for HumanLikeDelays {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(500),
            max: Duration::from_millis(2500),
            pointer_area: (800.0, 800.0),
        }
    }
}

impl DelayPolicy for HumanLikeDelays {
    fn step_pause(&self) -> Duration {
        let spread = self.max.saturating_sub(self.min);
        self.min + spread.mul_f64(rand::thread_rng().gen_range(0.0..=1.0))
    }

    fn pointer_start(&self) -> (f64, f64) {
        let mut rng = rand::thread_rng();
        (
            rng.gen_range(0.0..self.pointer_area.0),
            rng.gen_range(0.0..self.pointer_area.1),
        )
    }
}

/// Zero-wait policy for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelays;

impl DelayPolicy for NoDelays {
    fn step_pause(&self) -> Duration {
        Duration::ZERO
    }

    fn pointer_start(&self) -> (f64, f64) {
        (0.0, 0.0)
    }
}
