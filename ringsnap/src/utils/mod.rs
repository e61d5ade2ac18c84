use std::time::{Duration, Instant};

/// Measures the cost of a sequence of steps.
///
/// `lap` returns the time since the previous lap (or start); `total` the
/// time since start.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
  start: Instant,
  lap: Instant,
}

impl Stopwatch {
  pub fn start() -> Self {
    let now = Instant::now();
    Self {
      start: now,
      lap: now,
    }
  }

  pub fn lap(&mut self) -> Duration {
    let now = Instant::now();
    let elapsed = now - self.lap;
    self.lap = now;
    elapsed
  }

  pub fn total(&self) -> Duration {
    self.start.elapsed()
  }
}

/// Formats a duration as seconds with millisecond precision, e.g. `0.012s`.
pub fn seconds(d: Duration) -> String {
  format!("{:.3}s", d.as_secs_f64())
}
