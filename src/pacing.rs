use std::time::Duration;

use rand::Rng;

/// Pluggable pacing between portal requests, so the timers can be swapped out
/// for a deterministic source in tests.
pub trait DelayPolicy: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Uniform random delay between `min` and `max` seconds, the portal's informal
/// rate tolerance. Not adaptive: the draw is independent of success/failure.
#[derive(Debug, Clone)]
pub struct UniformJitter {
    min: Duration,
    max: Duration,
}

impl UniformJitter {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        UniformJitter {
            min: Duration::from_secs(min_secs.min(max_secs)),
            max: Duration::from_secs(max_secs.max(min_secs)),
        }
    }
}

impl DelayPolicy for UniformJitter {
    fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let mut rng = rand::thread_rng();
        rng.gen_range(self.min..self.max)
    }
}

/// No pacing at all, for tests.
#[derive(Debug, Clone)]
pub struct NoDelay;

impl DelayPolicy for NoDelay {
    fn next_delay(&self) -> Duration {
        Duration::ZERO
    }
}
