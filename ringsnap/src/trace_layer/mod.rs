use std::fmt::Write;
use std::sync::Arc;

use tracing::{field::Field, Event as TracingEvent, Subscriber};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

use crate::event::{now_millis, Event};
use crate::queue::RingQueue;
use crate::sink::QUEUE_TARGET;

/// A `tracing` layer that keeps the most recent log events in a shared
/// [`RingQueue`], dropping the oldest once `max_len` is reached.
#[derive(Debug, Clone)]
pub struct QueueLayer {
  pub queue: Arc<RingQueue<Event>>,
  pub max_len: usize,
}

impl QueueLayer {
  pub fn new(queue: Arc<RingQueue<Event>>, max_len: usize) -> Self {
    Self { queue, max_len }
  }
}

impl<S> Layer<S> for QueueLayer
where
  S: Subscriber + for<'a> LookupSpan<'a>,
{
  fn on_event(&self, event: &TracingEvent<'_>, _ctx: Context<'_, S>) {
    let meta = event.metadata();
    // Queue traces are emitted while the queue lock is held.
    if meta.target() == QUEUE_TARGET {
      return;
    }

    let mut visitor = MessageVisitor::default();
    event.record(&mut visitor);

    let captured = Event::new(
      now_millis(),
      meta.level().to_string(),
      meta.target().to_string(),
      visitor.finish(),
    );

    self.queue.slide_with_limit(captured, self.max_len);
  }
}

/// Collects the `message` field plus any other fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
  message: String,
  fields: String,
}

impl MessageVisitor {
  fn finish(self) -> String {
    if self.fields.is_empty() {
      self.message
    } else if self.message.is_empty() {
      self.fields
    } else {
      format!("{} {}", self.message, self.fields)
    }
  }

  fn push_field(&mut self, field: &Field, value: &dyn std::fmt::Display) {
    if !self.fields.is_empty() {
      self.fields.push(' ');
    }
    let _ = write!(self.fields, "{}={}", field.name(), value);
  }
}

impl tracing::field::Visit for MessageVisitor {
  fn record_str(&mut self, field: &Field, value: &str) {
    if field.name() == "message" {
      self.message = value.to_string();
    } else {
      self.push_field(field, &value);
    }
  }

  fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
    if field.name() == "message" {
      self.message = format!("{:?}", value);
    } else {
      self.push_field(field, &format_args!("{:?}", value));
    }
  }
}
