#[cfg(test)]
mod __test__ {
  use std::fs;

  use tempfile::tempdir;

  use crate::config::{Config, QueueConfig};
  use crate::error::ConfigError;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.log_level, "info");
    assert_eq!(config.log_capture, 200);
    assert!(config.queues.is_empty());

    let queue = QueueConfig::default();
    assert_eq!(queue.name, "queue");
    assert_eq!(queue.step, 1024);
    assert!(!queue.trace);
    assert!(queue.snapshot_path.is_none());
    assert_eq!(queue.save_interval_secs, 0);
  }

  #[test]
  fn test_partial_file_fills_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
      &path,
      r#"{ "queues": [ { "name": "orders", "snapshot_path": "/var/lib/orders.json" }, {} ] }"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.log_level, "info");
    assert_eq!(config.queues.len(), 2);
    assert_eq!(config.queues[0].name, "orders");
    assert_eq!(config.queues[0].step, 1024);
    assert_eq!(
      config.queues[0].snapshot_path.as_deref().and_then(|p| p.to_str()),
      Some("/var/lib/orders.json")
    );
    assert_eq!(config.queues[1], QueueConfig::default());
  }

  #[test]
  fn test_missing_file_is_default() {
    let dir = tempdir().unwrap();
    let config = Config::load(dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
  }

  #[test]
  fn test_malformed_file_is_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "queues": 3 }"#).unwrap();

    assert!(matches!(
      Config::load(&path),
      Err(ConfigError::Parse { .. })
    ));
  }
}
