//! # Persist Module
//!
//! Keeps snapshot-backed state on disk for the lifetime of a process.
//!
//! ## Lifecycle
//!
//! 1. [`Persister::start`] loads every registered item in order and stops
//!    at the first failure, so a process never runs on half-restored state.
//! 2. One worker thread per item then saves it every [`Persistence::interval`]
//!    (never, when the interval is zero) and on [`Message::SaveNow`].
//! 3. On [`Message::Shutdown`], or once every [`Controller`] is gone, each
//!    worker performs a final save and exits.
//!
//! Save failures are logged and otherwise ignored; the process keeps
//! running with the last snapshot that made it to disk.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ringsnap::persist::{Persistence, Persister};
//! use ringsnap::queue::RingQueue;
//!
//! let orders = Arc::new(
//!   RingQueue::<u64>::with_snapshot(1024, "/var/lib/app/orders.json")
//!     .with_name("orders")
//!     .with_save_interval(Duration::from_secs(60)),
//! );
//!
//! let handle = Persister::start(vec![orders.clone() as Arc<dyn Persistence>])?;
//! orders.push(42);
//! handle.shutdown(); // final save, then join
//! # Ok::<(), ringsnap::error::PersistError>(())
//! ```

mod __test__;

use crossbeam_channel::{select, Receiver, Sender};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::error::{PersistError, SnapshotError};
use crate::queue::RingQueue;
use crate::snapshot::SnapshotStore;
use crate::utils::{seconds, Stopwatch};

/// State that can be restored from and written to a snapshot.
pub trait Persistence: Send + Sync {
  /// Name used in log lines and worker thread names.
  fn name(&self) -> &str;

  fn load(&self) -> Result<(), SnapshotError>;

  fn save(&self) -> Result<(), SnapshotError>;

  /// Time between periodic saves. Zero disables them.
  fn interval(&self) -> Duration {
    Duration::ZERO
  }
}

impl<T> Persistence for RingQueue<T>
where
  T: Serialize + DeserializeOwned + Send + Sync,
{
  fn name(&self) -> &str {
    RingQueue::name(self)
  }

  fn load(&self) -> Result<(), SnapshotError> {
    RingQueue::load(self)
  }

  fn save(&self) -> Result<(), SnapshotError> {
    RingQueue::save(self)
  }

  fn interval(&self) -> Duration {
    self.save_interval()
  }
}

/// A single lock-guarded value persisted as one JSON document.
///
/// Useful for counters, cursors and small maps that should survive restarts
/// next to the queues they describe.
pub struct SnapCell<T> {
  name: String,
  interval: Duration,
  store: SnapshotStore,
  value: RwLock<T>,
}

impl<T> SnapCell<T> {
  pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, value: T) -> Self {
    Self {
      name: name.into(),
      interval: Duration::ZERO,
      store: SnapshotStore::new(path),
      value: RwLock::new(value),
    }
  }

  pub fn with_save_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  pub fn set(&self, value: T) {
    *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
  }

  /// Runs `f` on the value under the write lock.
  pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
    let mut value = self.value.write().unwrap_or_else(PoisonError::into_inner);
    f(&mut *value)
  }
}

impl<T: Clone> SnapCell<T> {
  pub fn get(&self) -> T {
    self
      .value
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

impl<T> Persistence for SnapCell<T>
where
  T: Serialize + DeserializeOwned + Send + Sync,
{
  fn name(&self) -> &str {
    &self.name
  }

  fn load(&self) -> Result<(), SnapshotError> {
    let mut value = self.value.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(loaded) = self.store.load::<T>()? {
      *value = loaded;
    }
    Ok(())
  }

  fn save(&self) -> Result<(), SnapshotError> {
    let value = self.value.write().unwrap_or_else(PoisonError::into_inner);
    self.store.save(&*value)
  }

  fn interval(&self) -> Duration {
    self.interval
  }
}

/// Requests sent to save workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
  /// Save right away; the reason ends up in the log line.
  SaveNow(String),
  /// Save one last time and exit.
  Shutdown,
}

impl fmt::Display for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Message::SaveNow(reason) => write!(f, "SaveNow: {}", reason),
      Message::Shutdown => write!(f, "Shutdown"),
    }
  }
}

/// Cloneable handle that broadcasts [`Message`]s to every save worker.
#[derive(Debug, Clone)]
pub struct Controller {
  senders: Vec<Sender<Message>>,
}

impl Controller {
  /// Sends `message` to every worker still running and returns how many
  /// received it.
  pub fn broadcast(&self, message: Message) -> usize {
    self
      .senders
      .iter()
      .filter(|sender| sender.send(message.clone()).is_ok())
      .count()
  }

  pub fn request_save(&self, reason: &str) -> usize {
    self.broadcast(Message::SaveNow(reason.to_string()))
  }

  pub fn shutdown(&self) -> usize {
    self.broadcast(Message::Shutdown)
  }
}

/// Running save workers started by [`Persister::start`].
#[derive(Debug)]
pub struct PersistHandle {
  controller: Controller,
  workers: Vec<JoinHandle<()>>,
}

impl PersistHandle {
  pub fn controller(&self) -> Controller {
    self.controller.clone()
  }

  pub fn request_save(&self, reason: &str) {
    self.controller.request_save(reason);
  }

  /// Asks every worker for a final save and waits for all of them.
  pub fn shutdown(self) {
    self.controller.shutdown();
    self.wait();
  }

  /// Waits for the workers to exit.
  ///
  /// Workers exit on a broadcast `Shutdown`, or once every controller clone
  /// (including the one inside this handle, dropped here) is gone.
  pub fn wait(self) {
    let PersistHandle {
      controller,
      workers,
    } = self;
    drop(controller);

    for worker in workers {
      let name = worker.thread().name().unwrap_or("snap").to_string();
      if worker.join().is_err() {
        error!("Save worker panicked, name: {}.", name);
      }
    }
  }
}

/// Entry point of the persistence lifecycle.
pub struct Persister;

impl Persister {
  /// Loads every item, then starts one save worker per item.
  ///
  /// # Errors
  /// Returns the first load failure; no worker is started in that case.
  pub fn start(items: Vec<Arc<dyn Persistence>>) -> Result<PersistHandle, PersistError> {
    Self::load_all(&items)?;

    let mut senders = Vec::with_capacity(items.len());
    let mut workers = Vec::with_capacity(items.len());
    for item in items {
      let (sender, receiver) = crossbeam_channel::unbounded::<Message>();
      let worker = thread::Builder::new()
        .name(format!("snap-{}", item.name()))
        .spawn(move || Self::save_loop(item, receiver))?;

      senders.push(sender);
      workers.push(worker);
    }

    Ok(PersistHandle {
      controller: Controller { senders },
      workers,
    })
  }

  fn load_all(items: &[Arc<dyn Persistence>]) -> Result<(), PersistError> {
    let mut watch = Stopwatch::start();
    for item in items {
      if let Err(source) = item.load() {
        error!("Load snapshot failed, name: {}, error: {}.", item.name(), source);
        return Err(PersistError::Load {
          name: item.name().to_string(),
          source,
        });
      }
      info!(
        "Load snapshot succeed, name: {}, cost: {}.",
        item.name(),
        seconds(watch.lap())
      );
    }
    info!("Loaded all snapshots, cost: {}.", seconds(watch.total()));
    Ok(())
  }

  /// Body of a save worker. Runs until shutdown or until every sender is
  /// dropped, and always ends with a save.
  fn save_loop(item: Arc<dyn Persistence>, receiver: Receiver<Message>) {
    let interval = item.interval();
    let ticker: Receiver<Instant> = if interval.is_zero() {
      crossbeam_channel::never()
    } else {
      crossbeam_channel::tick(interval)
    };

    loop {
      select! {
        recv(ticker) -> _ => {
          let _ = Self::save(item.as_ref(), "periodic");
        },
        recv(receiver) -> message => match message {
          Ok(Message::SaveNow(reason)) => {
            let _ = Self::save(item.as_ref(), &reason);
          },
          Ok(Message::Shutdown) | Err(_) => {
            let _ = Self::save(item.as_ref(), "shutdown");
            break;
          },
        },
      }
    }
  }

  fn save(item: &dyn Persistence, reason: &str) -> Result<(), SnapshotError> {
    let watch = Stopwatch::start();
    let result = item.save();
    match &result {
      Ok(()) => info!(
        "Save snapshot succeed, name: {}, reason: {}, cost: {}.",
        item.name(),
        reason,
        seconds(watch.total())
      ),
      Err(e) => error!(
        "Save snapshot failed, name: {}, reason: {}, error: {}.",
        item.name(),
        reason,
        e
      ),
    }
    result
  }
}
