//! Timing helpers

use std::time::{Duration, Instant};

/// Run `f` and return its result with the wall-clock time it took
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}

/// Elapsed milliseconds divided evenly over `items`
pub fn millis_per_item(elapsed: Duration, items: usize) -> f64 {
    if items == 0 {
        return 0.0;
    }
    elapsed.as_secs_f64() * 1000.0 / items as f64
}

/// `YYYY-MM-DD_HH-MM-SS` stamp for run outputs
pub fn run_stamp(now: chrono::DateTime<chrono::Local>) -> String {
    now.format("%Y-%m-%d_%H-%M-%S").to_string()
}
