#[cfg(test)]
mod __test__ {
  use std::collections::BTreeMap;
  use std::fs;
  use std::io;
  use std::path::PathBuf;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::thread;
  use std::time::{Duration, Instant};

  use tempfile::tempdir;

  use crate::error::{PersistError, SnapshotError};
  use crate::persist::{Message, Persistence, Persister, SnapCell};
  use crate::queue::RingQueue;

  /// Counts calls and optionally fails them.
  #[derive(Default)]
  struct Probe {
    name: String,
    interval: Duration,
    fail_load: bool,
    fail_save: bool,
    loads: AtomicUsize,
    saves: AtomicUsize,
  }

  impl Probe {
    fn named(name: &str) -> Self {
      Self {
        name: name.to_string(),
        ..Self::default()
      }
    }

    fn failure(&self) -> SnapshotError {
      SnapshotError::Write {
        path: PathBuf::from(format!("{}.json", self.name)),
        source: io::Error::new(io::ErrorKind::Other, "disk full"),
      }
    }
  }

  impl Persistence for Probe {
    fn name(&self) -> &str {
      &self.name
    }

    fn load(&self) -> Result<(), SnapshotError> {
      self.loads.fetch_add(1, Ordering::SeqCst);
      if self.fail_load {
        return Err(self.failure());
      }
      Ok(())
    }

    fn save(&self) -> Result<(), SnapshotError> {
      self.saves.fetch_add(1, Ordering::SeqCst);
      if self.fail_save {
        return Err(self.failure());
      }
      Ok(())
    }

    fn interval(&self) -> Duration {
      self.interval
    }
  }

  fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
      if done() {
        return true;
      }
      thread::sleep(Duration::from_millis(5));
    }
    done()
  }

  #[test]
  fn test_start_loads_saved_queue() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("orders.json");
    fs::write(&path, "[1,2,3]").unwrap();

    let orders = Arc::new(RingQueue::<u32>::with_snapshot(4, &path).with_name("orders"));
    let handle = Persister::start(vec![orders.clone() as Arc<dyn Persistence>]).unwrap();

    assert_eq!(orders.copy_items(), vec![1, 2, 3]);
    handle.shutdown();
  }

  #[test]
  fn test_start_stops_at_first_load_failure() {
    let first = Arc::new(Probe::named("first"));
    let broken = Arc::new(Probe {
      fail_load: true,
      ..Probe::named("broken")
    });
    let last = Arc::new(Probe::named("last"));

    let result = Persister::start(vec![
      first.clone() as Arc<dyn Persistence>,
      broken.clone() as Arc<dyn Persistence>,
      last.clone() as Arc<dyn Persistence>,
    ]);

    match result {
      Err(PersistError::Load { name, .. }) => assert_eq!(name, "broken"),
      other => panic!("expected load failure, got {:?}", other.map(|_| ())),
    }
    assert_eq!(first.loads.load(Ordering::SeqCst), 1);
    assert_eq!(last.loads.load(Ordering::SeqCst), 0);
    assert_eq!(first.saves.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn test_shutdown_performs_final_save() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("final.json");

    let queue = Arc::new(RingQueue::<String>::with_snapshot(4, &path));
    let handle = Persister::start(vec![queue.clone() as Arc<dyn Persistence>]).unwrap();

    queue.push("a".to_string());
    queue.push("b".to_string());
    assert!(!path.exists());

    handle.shutdown();
    assert_eq!(fs::read_to_string(&path).unwrap(), r#"["a","b"]"#);
  }

  #[test]
  fn test_request_save_saves_immediately() {
    let probe = Arc::new(Probe::named("manual"));
    let handle = Persister::start(vec![probe.clone() as Arc<dyn Persistence>]).unwrap();

    handle.request_save("checkpoint");
    assert!(wait_until(Duration::from_secs(2), || {
      probe.saves.load(Ordering::SeqCst) >= 1
    }));

    handle.shutdown();
    assert_eq!(probe.saves.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn test_periodic_saves() {
    let probe = Arc::new(Probe {
      interval: Duration::from_millis(10),
      ..Probe::named("ticking")
    });
    let handle = Persister::start(vec![probe.clone() as Arc<dyn Persistence>]).unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
      probe.saves.load(Ordering::SeqCst) >= 3
    }));

    let before = probe.saves.load(Ordering::SeqCst);
    handle.shutdown();
    assert!(probe.saves.load(Ordering::SeqCst) > before);
  }

  #[test]
  fn test_zero_interval_only_saves_on_shutdown() {
    let probe = Arc::new(Probe::named("idle"));
    let handle = Persister::start(vec![probe.clone() as Arc<dyn Persistence>]).unwrap();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(probe.saves.load(Ordering::SeqCst), 0);

    handle.shutdown();
    assert_eq!(probe.saves.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_save_failures_do_not_stop_worker() {
    let probe = Arc::new(Probe {
      fail_save: true,
      ..Probe::named("flaky")
    });
    let handle = Persister::start(vec![probe.clone() as Arc<dyn Persistence>]).unwrap();

    handle.request_save("one");
    handle.request_save("two");
    assert!(wait_until(Duration::from_secs(2), || {
      probe.saves.load(Ordering::SeqCst) >= 2
    }));

    handle.shutdown();
    assert_eq!(probe.saves.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn test_controller_broadcasts_to_every_worker() {
    let a = Arc::new(Probe::named("a"));
    let b = Arc::new(Probe::named("b"));
    let handle = Persister::start(vec![
      a.clone() as Arc<dyn Persistence>,
      b.clone() as Arc<dyn Persistence>,
    ])
    .unwrap();

    let controller = handle.controller();
    assert_eq!(controller.request_save("both"), 2);
    assert_eq!(controller.shutdown(), 2);
    handle.wait();

    assert_eq!(a.saves.load(Ordering::SeqCst), 2);
    assert_eq!(b.saves.load(Ordering::SeqCst), 2);
    assert_eq!(controller.request_save("late"), 0);
  }

  #[test]
  fn test_wait_returns_once_controllers_are_gone() {
    let probe = Arc::new(Probe::named("orphan"));
    let handle = Persister::start(vec![probe.clone() as Arc<dyn Persistence>]).unwrap();

    handle.wait();
    assert_eq!(probe.saves.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_snap_cell_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cursor.json");

    let cell = SnapCell::new("cursor", &path, BTreeMap::<String, u64>::new());
    cell.update(|map| map.insert("orders".to_string(), 17));
    cell.save().unwrap();

    let restored = SnapCell::new("cursor", &path, BTreeMap::<String, u64>::new());
    restored.load().unwrap();
    assert_eq!(restored.get().get("orders"), Some(&17));
    assert_eq!(restored.name(), "cursor");
  }

  #[test]
  fn test_snap_cell_keeps_value_without_file() {
    let dir = tempdir().unwrap();
    let cell = SnapCell::new("counter", dir.path().join("none.json"), 5u32)
      .with_save_interval(Duration::from_secs(9));

    cell.load().unwrap();
    assert_eq!(cell.get(), 5);
    assert_eq!(cell.interval(), Duration::from_secs(9));

    cell.set(6);
    assert_eq!(cell.get(), 6);
  }

  #[test]
  fn test_message_display() {
    assert_eq!(
      Message::SaveNow("SIGHUP".to_string()).to_string(),
      "SaveNow: SIGHUP"
    );
    assert_eq!(Message::Shutdown.to_string(), "Shutdown");
  }
}
