use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ringsnap::config::Config;
use ringsnap::event::{now_millis, Event};
use ringsnap::logging::{init_logging, init_logging_with_capture};
use ringsnap::persist::{Persistence, Persister, SnapCell};
use ringsnap::queue::RingQueue;
use ringsnap::signal_hook::SignalHook;

/// Keep one minute of ticks.
const TICK_WINDOW_MS: u64 = 60_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tick {
  seq: u64,
  at: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let config_path = env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
  let config = Config::load(&config_path)?;

  let recent_logs = Arc::new(RingQueue::<Event>::new(64));
  if config.log_capture == 0 {
    init_logging(&config.log_level);
  } else {
    init_logging_with_capture(&config.log_level, Arc::clone(&recent_logs), config.log_capture);
  }

  let queues: Vec<Arc<RingQueue<Tick>>> = config
    .queues
    .iter()
    .map(|c| Arc::new(RingQueue::from_config(c)))
    .collect();
  let seq = Arc::new(SnapCell::new("seq", "./snapshots/seq.json", 0u64));

  let mut items: Vec<Arc<dyn Persistence>> = queues
    .iter()
    .map(|q| Arc::clone(q) as Arc<dyn Persistence>)
    .collect();
  items.push(seq.clone());

  let handle = Persister::start(items)?;
  let _signals = SignalHook::install(handle.controller())?;
  info!("ringsnap-simple running; SIGHUP saves, SIGINT/SIGTERM exit.");

  let producer_queues = queues.clone();
  let producer_seq = Arc::clone(&seq);
  thread::spawn(move || loop {
    let tick = Tick {
      seq: producer_seq.update(|n| {
        *n += 1;
        *n
      }),
      at: now_millis(),
    };
    let cutoff = tick.at.saturating_sub(TICK_WINDOW_MS);
    for queue in &producer_queues {
      if let Some(expired) = queue.slide_with(tick.clone(), |t| t.at < cutoff) {
        info!("{}: expired ticks up to #{}", queue.name(), expired.seq);
      }
    }
    thread::sleep(Duration::from_millis(250));
  });

  handle.wait();

  for queue in &queues {
    match queue.tail_item() {
      Ok(last) => info!("{}: {} ticks kept, last #{}", queue.name(), queue.len(), last.seq),
      Err(e) => warn!("{}: {}", queue.name(), e),
    }
  }
  let warnings = recent_logs.find_all(|e| e.level == "WARN" || e.level == "ERROR");
  println!("{} warnings/errors among the last {} log lines", warnings.len(), recent_logs.len());

  Ok(())
}
