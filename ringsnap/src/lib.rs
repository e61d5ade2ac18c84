//! A growable ring queue with sliding windows and atomic JSON snapshots.
//!
//! The core type is [`queue::RingQueue`]. Around it:
//! - [`snapshot`] writes and reads the snapshot files,
//! - [`persist`] restores snapshots at startup and keeps saving them,
//! - [`signal_hook`] turns process signals into saves and shutdowns,
//! - [`trace_layer`] captures `tracing` events into a queue.

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod persist;
pub mod queue;
pub mod signal_hook;
pub mod sink;
pub mod snapshot;
pub mod trace_layer;
pub mod utils;

pub use error::{ConfigError, PersistError, QueueError, SnapshotError};
pub use queue::RingQueue;
