
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::config::QueueConfig;
use crate::error::{QueueError, SnapshotError};
use crate::sink::{TraceSink, TracingSink};
use crate::snapshot::SnapshotStore;

/// Growth step used when a queue is built with a step of zero.
pub const DEFAULT_STEP: usize = 1024;

/// Name given to queues that were not named explicitly.
pub const DEFAULT_NAME: &str = "queue";

/// Unsynchronized circular storage.
///
/// One slot is always kept free so that `head == tail` means empty and
/// `next(tail) == head` means full. Capacity is always `step * k + 1`.
struct Ring<T> {
  list: Vec<Option<T>>,
  head: usize,
  tail: usize,
  step: usize,
  sink: Option<Arc<dyn TraceSink>>,
}

fn empty_slots<T>(n: usize) -> Vec<Option<T>> {
  std::iter::repeat_with(|| None).take(n).collect()
}

impl<T> Ring<T> {
  fn with_step(step: usize) -> Self {
    Self {
      list: empty_slots(step + 1),
      head: 0,
      tail: 0,
      step,
      sink: None,
    }
  }

  #[inline]
  fn cap(&self) -> usize {
    self.list.len()
  }

  fn len(&self) -> usize {
    if self.tail >= self.head {
      self.tail - self.head
    } else {
      self.tail + self.cap() - self.head
    }
  }

  #[inline]
  fn previous(&self, i: usize) -> usize {
    (i + self.cap() - 1) % self.cap()
  }

  #[inline]
  fn next(&self, i: usize) -> usize {
    (i + 1) % self.cap()
  }

  #[inline]
  fn is_empty(&self) -> bool {
    self.head == self.tail
  }

  #[inline]
  fn is_full(&self) -> bool {
    self.next(self.tail) == self.head
  }

  fn is_valid_index(&self, i: usize) -> bool {
    if i >= self.cap() {
      return false;
    }
    if self.head < self.tail {
      i >= self.head && i < self.tail
    } else if self.head > self.tail {
      i >= self.head || i < self.tail
    } else {
      false
    }
  }

  fn get(&self, i: usize) -> Result<&T, QueueError> {
    if self.is_empty() {
      return Err(QueueError::Empty);
    }
    if !self.is_valid_index(i) {
      return Err(QueueError::IndexOutOfRange);
    }
    self.list[i].as_ref().ok_or(QueueError::IndexOutOfRange)
  }

  fn head_item(&self) -> Result<&T, QueueError> {
    self.get(self.head)
  }

  fn tail_item(&self) -> Result<&T, QueueError> {
    self.get(self.previous(self.tail))
  }

  /// Raw slot indices of the live items, head to tail or tail to head.
  fn indices(&self, reverse: bool) -> impl Iterator<Item = usize> {
    let (head, len, cap) = (self.head, self.len(), self.cap());
    (0..len).map(move |k| {
      if reverse {
        (head + len - 1 - k) % cap
      } else {
        (head + k) % cap
      }
    })
  }

  fn items(&self, reverse: bool) -> impl Iterator<Item = (usize, &T)> + '_ {
    self
      .indices(reverse)
      .filter_map(move |i| self.list[i].as_ref().map(|item| (i, item)))
  }

  fn push(&mut self, item: T) {
    self.grow();

    let tail = self.tail;
    self.list[tail] = Some(item);
    self.tail = self.next(tail);

    self.trace("push");
  }

  fn pop(&mut self) -> Option<T> {
    if self.is_empty() {
      self.trace("pop nothing");
      return None;
    }

    self.reduce();

    let head = self.head;
    let item = self.list[head].take();
    self.head = self.next(head);

    self.trace("pop");

    item
  }

  fn grow(&mut self) {
    if !self.is_full() {
      return;
    }
    self.migrate(self.cap() + self.step);
  }

  // Shrinks by 3 steps once 6 steps are free; the gap keeps alternating
  // push/pop near a boundary from resizing on every call.
  fn reduce(&mut self) {
    if self.cap() - self.len() < 6 * self.step {
      return;
    }
    self.migrate(self.cap() - 3 * self.step);
  }

  /// Moves the live items to the front of a fresh slot array of `new_cap`.
  fn migrate(&mut self, new_cap: usize) {
    self.trace("migrate before");

    let len = self.len();
    let mut list = empty_slots(new_cap);
    let mut i = self.head;
    for slot in list.iter_mut().take(len) {
      *slot = self.list[i].take();
      i = self.next(i);
    }

    self.list = list;
    self.head = 0;
    self.tail = len;

    self.trace("migrate after");
  }

  fn reset(&mut self, items: Vec<T>) {
    let blocks = items.len().div_ceil(self.step).max(1);
    let mut list = empty_slots(blocks * self.step + 1);

    let len = items.len();
    for (slot, item) in list.iter_mut().zip(items) {
      *slot = Some(item);
    }

    self.list = list;
    self.head = 0;
    self.tail = len;

    self.trace("reset");
  }

  fn status(&self) -> String {
    format!(
      "head: {:<4}, tail: {:<4}, len: {:<4}, cap: {:<4}",
      self.head,
      self.tail,
      self.len(),
      self.cap()
    )
  }

  fn trace(&self, tag: &str) {
    if let Some(sink) = &self.sink {
      sink.trace(&format!("{} => {}", tag, self.status()));
    }
  }
}

/// A growable circular FIFO queue guarded by a single reader-writer lock.
///
/// Items are pushed at the tail and popped at the head. The backing array
/// grows by `step` slots when a push finds it full and shrinks by `3 * step`
/// slots when a pop finds at least `6 * step` free slots. Resizing moves the
/// live items to the front of a new array.
///
/// Besides plain FIFO use the queue offers sliding windows (bounded by count
/// or by a predicate on the oldest item), directional scans, and JSON
/// snapshots of its contents.
///
/// # Locking
///
/// Mutating operations take the write lock for their whole duration,
/// including resizes and snapshot I/O. Queries take the read lock. Nothing
/// hands out references into the storage; accessors return clones.
///
/// # Example
/// ```rust
/// use ringsnap::queue::RingQueue;
///
/// let queue = RingQueue::new(2);
/// queue.push("a");
/// queue.push("b");
/// queue.push("c"); // grows from 3 to 5 slots
///
/// assert_eq!(queue.cap(), 5);
/// assert_eq!(queue.pop(), Some("a"));
/// assert_eq!(queue.copy_items(), vec!["b", "c"]);
/// ```
pub struct RingQueue<T> {
  name: String,
  save_interval: Duration,
  store: Option<SnapshotStore>,
  ring: RwLock<Ring<T>>,
}

impl<T> RingQueue<T> {
  /// Creates a memory-only queue. A `step` of zero selects [`DEFAULT_STEP`].
  pub fn new(step: usize) -> Self {
    let step = if step == 0 { DEFAULT_STEP } else { step };
    Self {
      name: DEFAULT_NAME.to_string(),
      save_interval: Duration::ZERO,
      store: None,
      ring: RwLock::new(Ring::with_step(step)),
    }
  }

  /// Creates a queue whose contents can be saved to and loaded from `path`.
  pub fn with_snapshot(step: usize, path: impl Into<PathBuf>) -> Self {
    let mut queue = Self::new(step);
    queue.store = Some(SnapshotStore::new(path));
    queue
  }

  /// Builds a queue from its configuration section.
  pub fn from_config(config: &QueueConfig) -> Self {
    let mut queue = match &config.snapshot_path {
      Some(path) => Self::with_snapshot(config.step, path.clone()),
      None => Self::new(config.step),
    };
    queue.name = config.name.clone();
    queue.save_interval = Duration::from_secs(config.save_interval_secs);
    if config.trace {
      queue = queue.with_trace(Arc::new(TracingSink));
    }
    queue
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  /// Sets how often the persistence driver saves this queue. Zero disables
  /// periodic saves; the final save on shutdown still happens.
  pub fn with_save_interval(mut self, interval: Duration) -> Self {
    self.save_interval = interval;
    self
  }

  /// Enables debug tracing of every push, pop and resize into `sink`.
  pub fn with_trace(mut self, sink: Arc<dyn TraceSink>) -> Self {
    self
      .ring
      .get_mut()
      .unwrap_or_else(PoisonError::into_inner)
      .sink = Some(sink);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn save_interval(&self) -> Duration {
    self.save_interval
  }

  pub fn snapshot_path(&self) -> Option<&Path> {
    self.store.as_ref().map(SnapshotStore::path)
  }

  pub fn step(&self) -> usize {
    self.read().step
  }

  fn read(&self) -> RwLockReadGuard<'_, Ring<T>> {
    self.ring.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, Ring<T>> {
    self.ring.write().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn len(&self) -> usize {
    self.read().len()
  }

  pub fn cap(&self) -> usize {
    self.read().cap()
  }

  pub fn is_empty(&self) -> bool {
    self.read().is_empty()
  }

  /// One-line description of the indices, e.g.
  /// `head: 0   , tail: 2   , len: 2   , cap: 3   `.
  pub fn status(&self) -> String {
    self.read().status()
  }

  /// Appends `item` at the tail, growing the storage first if it is full.
  pub fn push(&self, item: T) {
    self.write().push(item);
  }

  /// Removes and returns the head item, or `None` when the queue is empty.
  pub fn pop(&self) -> Option<T> {
    self.write().pop()
  }

  /// Pops from the head while `matches` accepts the head item.
  ///
  /// Returns the popped items oldest first.
  pub fn pop_many<F>(&self, mut matches: F) -> Vec<T>
  where
    F: FnMut(&T) -> bool,
  {
    let mut guard = self.write();
    let ring = &mut *guard;

    let mut popped = Vec::new();
    while let Ok(head) = ring.head_item() {
      if !matches(head) {
        break;
      }
      if let Some(item) = ring.pop() {
        popped.push(item);
      }
    }
    popped
  }

  /// Pushes `item`, then pops from the head until at most `max_len` items
  /// remain.
  ///
  /// Returns the last evicted item, or `None` if nothing had to go.
  ///
  /// # Example
  /// ```rust
  /// use ringsnap::queue::RingQueue;
  ///
  /// let window = RingQueue::new(4);
  /// window.push('x');
  /// window.push('y');
  /// assert_eq!(window.slide_with_limit('z', 2), Some('x'));
  /// assert_eq!(window.copy_items(), vec!['y', 'z']);
  /// ```
  pub fn slide_with_limit(&self, item: T, max_len: usize) -> Option<T> {
    let mut ring = self.write();

    ring.push(item);

    if ring.len() <= max_len {
      ring.trace("slide deny");
      return None;
    }

    let mut evicted = None;
    while ring.len() > max_len {
      evicted = ring.pop();
    }

    ring.trace("slide allow");

    evicted
  }

  /// Pushes `item`, then pops from the head while `should_evict` accepts the
  /// head item.
  ///
  /// Returns the last evicted item, or `None` if nothing was evicted. The
  /// pushed item itself may be evicted if the predicate accepts it.
  pub fn slide_with<F>(&self, item: T, mut should_evict: F) -> Option<T>
  where
    F: FnMut(&T) -> bool,
  {
    let mut guard = self.write();
    let ring = &mut *guard;

    ring.push(item);

    let mut evicted = None;
    while let Ok(head) = ring.head_item() {
      if !should_evict(head) {
        break;
      }
      evicted = ring.pop();
    }

    ring.trace(if evicted.is_some() {
      "slide allow"
    } else {
      "slide deny"
    });

    evicted
  }

  /// Calls `visit` on every item, head to tail, or tail to head when
  /// `reverse` is set. Runs under the read lock.
  pub fn walk<F>(&self, mut visit: F, reverse: bool)
  where
    F: FnMut(&T),
  {
    let ring = self.read();
    for (_, item) in ring.items(reverse) {
      visit(item);
    }
  }
}

impl<T: Clone> RingQueue<T> {
  /// Returns the item stored at raw slot index `i`.
  ///
  /// Raw indices are the ones reported by [`find`](Self::find); they shift
  /// whenever the queue resizes.
  pub fn get(&self, i: usize) -> Result<T, QueueError> {
    self.read().get(i).cloned()
  }

  pub fn head_item(&self) -> Result<T, QueueError> {
    self.read().head_item().cloned()
  }

  pub fn tail_item(&self) -> Result<T, QueueError> {
    self.read().tail_item().cloned()
  }

  /// Returns the raw index and a copy of the first item accepted by
  /// `matches`, scanning from the head or, when `reverse` is set, the tail.
  pub fn find<F>(&self, mut matches: F, reverse: bool) -> Result<(usize, T), QueueError>
  where
    F: FnMut(&T) -> bool,
  {
    let ring = self.read();
    if ring.is_empty() {
      return Err(QueueError::Empty);
    }

    let found = ring
      .items(reverse)
      .find(|(_, item)| matches(*item))
      .map(|(i, item)| (i, item.clone()))
      .ok_or(QueueError::ItemNotFound);
    found
  }

  /// Returns every item accepted by `matches`, head to tail.
  pub fn find_all<F>(&self, mut matches: F) -> Vec<T>
  where
    F: FnMut(&T) -> bool,
  {
    self
      .read()
      .items(false)
      .filter(|(_, item)| matches(*item))
      .map(|(_, item)| item.clone())
      .collect()
  }

  /// Returns up to `n` items from the head, or from the tail when `reverse`
  /// is set. Items come out in scan order.
  pub fn terminal_items(&self, n: usize, reverse: bool) -> Vec<T> {
    self
      .read()
      .items(reverse)
      .take(n)
      .map(|(_, item)| item.clone())
      .collect()
  }

  /// Returns the run of items at one end that `matches` accepts, stopping at
  /// the first rejected item.
  pub fn terminal_items_while<F>(&self, mut matches: F, reverse: bool) -> Vec<T>
  where
    F: FnMut(&T) -> bool,
  {
    self
      .read()
      .items(reverse)
      .take_while(|(_, item)| matches(*item))
      .map(|(_, item)| item.clone())
      .collect()
  }

  /// Collects the items between the first `start` match and the following
  /// `stop` match in a single scan.
  ///
  /// The item that opens the window is always part of the result. Any later
  /// item matching `stop` closes the window and is left out. An item that
  /// matches both predicates before the window opened both opens and closes
  /// it, so the result is that single item. A `stop` match seen before any
  /// `start` match ends the scan.
  ///
  /// The flag is `true` only when both a start and a stop were seen.
  ///
  /// # Example
  /// ```rust
  /// use ringsnap::queue::RingQueue;
  ///
  /// let queue = RingQueue::new(8);
  /// for n in 1..=6 {
  ///   queue.push(n);
  /// }
  ///
  /// let (items, found) = queue.window(|n| *n == 2, |n| *n == 5, false);
  /// assert_eq!(items, vec![2, 3, 4]);
  /// assert!(found);
  /// ```
  pub fn window<S, E>(&self, mut start: S, mut stop: E, reverse: bool) -> (Vec<T>, bool)
  where
    S: FnMut(&T) -> bool,
    E: FnMut(&T) -> bool,
  {
    let ring = self.read();

    let mut started = false;
    let mut stopped = false;
    let mut window = Vec::new();
    for (_, item) in ring.items(reverse) {
      let opening = !started && start(item);
      started |= opening;

      if stop(item) {
        stopped = true;
        if opening {
          window.push(item.clone());
        }
        break;
      }

      if started {
        window.push(item.clone());
      }
    }

    (window, started && stopped)
  }

  /// Replaces the contents with `items`, head first.
  ///
  /// The new storage is the smallest `step * k + 1` slots that fit them.
  pub fn reset(&self, items: Vec<T>) {
    self.write().reset(items);
  }

  /// Copies the live items, head to tail.
  pub fn copy_items(&self) -> Vec<T> {
    self
      .read()
      .items(false)
      .map(|(_, item)| item.clone())
      .collect()
  }
}

impl<T: Serialize> RingQueue<T> {
  /// Writes the current contents to the snapshot file as a JSON array.
  ///
  /// Holds the write lock for the whole save so that concurrent saves never
  /// race on the temp file. Memory-only queues return `Ok(())`.
  pub fn save(&self) -> Result<(), SnapshotError> {
    let Some(store) = &self.store else {
      return Ok(());
    };

    let ring = self.write();
    let items: Vec<&T> = ring.items(false).map(|(_, item)| item).collect();
    store.save(&items)
  }
}

impl<T: DeserializeOwned> RingQueue<T> {
  /// Replaces the contents with the saved snapshot, if one exists.
  ///
  /// The file is fully decoded before the queue is touched; a corrupt file
  /// leaves the queue as it was.
  pub fn load(&self) -> Result<(), SnapshotError> {
    let Some(store) = &self.store else {
      return Ok(());
    };

    let mut ring = self.write();
    if let Some(items) = store.load::<Vec<T>>()? {
      ring.reset(items);
    }
    Ok(())
  }
}

impl<T> Default for RingQueue<T> {
  fn default() -> Self {
    Self::new(DEFAULT_STEP)
  }
}

impl<T> fmt::Debug for RingQueue<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingQueue")
      .field("name", &self.name)
      .field("snapshot", &self.snapshot_path())
      .field("status", &self.status())
      .finish()
  }
}
