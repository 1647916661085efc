//! Blocking wait for a termination signal.
use std::io;
use std::os::raw::c_int;
use std::sync::mpsc;
use std::thread;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::debug;

/// Signals that end the process.
pub const TERMINATION_SIGNALS: [c_int; 2] = [SIGINT, SIGTERM];

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("registering signal handlers: `{0}`")]
    Register(#[from] io::Error),
    #[error("signal listener stopped without delivering a signal")]
    ListenerStopped,
}

/// Handlers registered for a set of signals. Signals arriving between registration and
/// [`SignalWaiter::wait`] are kept and delivered by the wait.
pub struct SignalWaiter {
    signals: Signals,
}

impl SignalWaiter {
    pub fn register(signals: &[c_int]) -> Result<Self, SignalError> {
        let signals = Signals::new(signals)?;
        Ok(Self { signals })
    }

    /// Blocks until one of the registered signals arrives and returns it.
    ///
    /// A single listener thread forwards the first signal through a one-slot channel.
    pub fn wait(self) -> Result<c_int, SignalError> {
        let (tx, rx) = mpsc::sync_channel(1);
        let mut signals = self.signals;

        thread::spawn(move || {
            if let Some(signal) = signals.forever().next() {
                debug!(signal, "signal received");
                // The receiver only goes away once main is exiting.
                let _ = tx.send(signal);
            }
        });

        rx.recv().map_err(|_| SignalError::ListenerStopped)
    }
}

/// Conventional name of `signal`, as printed on shutdown.
pub fn signal_name(signal: c_int) -> String {
    match signal {
        SIGINT => "interrupt".to_string(),
        SIGTERM => "terminated".to_string(),
        other => format!("signal {other}"),
    }
}
