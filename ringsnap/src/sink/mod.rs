
use std::io::{self, Write};

/// Target used for every queue trace line.
pub const QUEUE_TARGET: &str = "ringsnap::queue";

/// Destination of queue debug traces.
///
/// A queue only calls its sink when tracing was enabled at construction, and
/// the sink never influences queue behaviour.
pub trait TraceSink: Send + Sync {
  fn trace(&self, line: &str);
}

/// Emits trace lines as `tracing` debug events on [`QUEUE_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
  fn trace(&self, line: &str) {
    tracing::debug!(target: QUEUE_TARGET, "[queue] {}", line);
  }
}

/// Writes trace lines straight to stderr, for processes without a subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl TraceSink for StderrSink {
  fn trace(&self, line: &str) {
    let _ = writeln!(io::stderr().lock(), "[queue] {}", line);
  }
}
