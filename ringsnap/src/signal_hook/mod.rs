
use ::signal_hook::{
  consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM},
  iterator::{Handle, Signals},
};
use std::io;
use std::thread;
use tracing::{info, warn};

use crate::persist::{Controller, Message};

/// Routes process signals to the save workers.
///
/// - `SIGINT`, `SIGTERM`, `SIGQUIT`: final save, then workers exit.
/// - `SIGHUP`: immediate save, workers keep running.
pub struct SignalHook {}

impl SignalHook {
  /// Starts the listener thread. Dropping the returned handle does not stop
  /// it; call [`Handle::close`] for that.
  pub fn install(controller: Controller) -> io::Result<Handle> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGQUIT, SIGHUP])?;
    let handle = signals.handle();

    thread::Builder::new()
      .name("snap-signals".to_string())
      .spawn(move || {
        for sig in signals.forever() {
          let (name, message) = match sig {
            SIGHUP => ("SIGHUP", Message::SaveNow("SIGHUP".to_string())),
            SIGINT => ("SIGINT", Message::Shutdown),
            SIGTERM => ("SIGTERM", Message::Shutdown),
            SIGQUIT => ("SIGQUIT", Message::Shutdown),
            _ => continue,
          };
          SignalHook::forward(&controller, name, message);
        }
      })?;

    Ok(handle)
  }

  fn forward(controller: &Controller, signal: &str, message: Message) {
    info!("Captured signal {}, broadcasting {}.", signal, message);
    let reached = controller.broadcast(message);
    if reached == 0 {
      warn!("No save worker left to handle {}.", signal);
    }
  }
}
