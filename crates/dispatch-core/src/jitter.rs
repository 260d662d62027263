//! Randomised delays emulating backend latency

use std::thread;
use std::time::Duration;

use rand_distr::{Distribution, Normal};

/// Mean and standard deviation of an injected delay
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct DelaySpec {
    pub mean: Duration,
    pub stddev: Duration,
}

impl DelaySpec {
    pub const ZERO: DelaySpec = DelaySpec {
        mean: Duration::ZERO,
        stddev: Duration::ZERO,
    };

    pub fn new(mean: Duration, stddev: Duration) -> Self {
        Self { mean, stddev }
    }

    pub fn from_millis(mean: u64, stddev: u64) -> Self {
        Self::new(Duration::from_millis(mean), Duration::from_millis(stddev))
    }

    /// Draw one delay, see [`sample`]
    pub fn sample(&self) -> Duration {
        sample(self.mean, self.stddev)
    }

    /// Sleep for one drawn delay, see [`wait`]
    pub fn wait(&self) {
        wait(self.mean, self.stddev)
    }
}

/// Draw a duration from a normal distribution around `mean`.
///
/// Negative draws are clamped to zero. Uses the thread-local generator, so
/// concurrent callers never contend on shared state.
pub fn sample(mean: Duration, stddev: Duration) -> Duration {
    if stddev.is_zero() {
        return mean;
    }
    let mean_secs = mean.as_secs_f64();
    // Only fails for a non-finite standard deviation, which a `Duration` cannot be.
    let Ok(normal) = Normal::new(mean_secs, stddev.as_secs_f64()) else {
        return mean;
    };
    let secs = normal.sample(&mut rand::thread_rng());
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

/// Suspend the calling thread for [`sample(mean, stddev)`](sample)
pub fn wait(mean: Duration, stddev: Duration) {
    let delay = sample(mean, stddev);
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
