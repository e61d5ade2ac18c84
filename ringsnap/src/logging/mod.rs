//! Process-wide `tracing` setup.
//!
//! Both initializers are safe to call more than once: only the first call
//! installs a subscriber, later calls return `false`.

use std::sync::Arc;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, Layer, Registry};

use crate::event::Event;
use crate::queue::RingQueue;
use crate::trace_layer::QueueLayer;

/// Parses `trace`/`debug`/`info`/`warn`/`error`/`off`, falling back to `info`.
pub fn parse_level(level: &str) -> LevelFilter {
  level.trim().parse().unwrap_or(LevelFilter::INFO)
}

/// Installs a stderr `fmt` subscriber limited to `level`.
pub fn init_logging(level: &str) -> bool {
  let filter = parse_level(level);
  let subscriber = Registry::default().with(
    fmt::layer()
      .with_writer(std::io::stderr)
      .with_target(true)
      .with_filter(filter),
  );
  tracing::subscriber::set_global_default(subscriber).is_ok()
}

/// Like [`init_logging`], and also records every event that passes `level`
/// into `queue`, keeping at most `max_len` of them.
pub fn init_logging_with_capture(level: &str, queue: Arc<RingQueue<Event>>, max_len: usize) -> bool {
  let filter = parse_level(level);
  let subscriber = Registry::default()
    .with(
      fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(filter),
    )
    .with(QueueLayer::new(queue, max_len).with_filter(filter));
  tracing::subscriber::set_global_default(subscriber).is_ok()
}
