
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A log record captured into a [`RingQueue`](crate::queue::RingQueue).
///
/// Events are plain serde data so a queue of them can be snapshotted like any
/// other queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  /// Milliseconds since the Unix epoch.
  pub timestamp: u64,

  /// Severity as printed by `tracing` (`"INFO"`, `"WARN"`, ...).
  pub level: String,

  /// Module path or explicit target of the log call.
  pub target: String,

  /// The formatted message.
  pub message: String,
}

impl Event {
  /// Creates a new `Event` from its parts.
  ///
  /// # Example
  ///
  /// ```rust
  /// use ringsnap::event::Event;
  /// let event = Event::new(
  ///     1_692_105_600_000u64,
  ///     "INFO".to_string(),
  ///     "auth".to_string(),
  ///     "User logged in".to_string(),
  /// );
  /// assert_eq!(event.level, "INFO");
  /// ```
  pub fn new(timestamp: u64, level: String, target: String, message: String) -> Self {
    Self {
      timestamp,
      level,
      target,
      message,
    }
  }

  /// Creates an event stamped with the current wall-clock time.
  pub fn now(level: impl Into<String>, target: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(
      now_millis(),
      level.into(),
      target.into(),
      message.into(),
    )
  }

  /// `true` when the event happened before `cutoff` (milliseconds since the
  /// epoch). Handy as the eviction test of a time-based
  /// [`slide_with`](crate::queue::RingQueue::slide_with) window.
  pub fn older_than(&self, cutoff: u64) -> bool {
    self.timestamp < cutoff
  }

  /// Serializes the event as a JSON object.
  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(self)
  }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
  u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

impl Default for Event {
  fn default() -> Self {
    Self {
      timestamp: 0,
      level: String::new(),
      target: String::new(),
      message: String::new(),
    }
  }
}

impl std::fmt::Display for Event {
  /// Formats the event as `[LEVEL] target: message`.
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}] {}: {}", self.level, self.target, self.message)
  }
}
