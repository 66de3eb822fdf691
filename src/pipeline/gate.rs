use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("no signal within {0:?}")]
    TimedOut(Duration),
    #[error("signal source disconnected")]
    Disconnected,
}

/// Sending half of a startup gate. Cheap to clone and safe to fire from any thread.
#[derive(Clone, Debug)]
pub struct GateSignal {
    tx: Sender<()>,
}

impl GateSignal {
    /// Sets the gate. Returns `false` when it was already set and not yet consumed.
    pub fn signal(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => false,
            // Nobody is left to wait.
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// Receiving half of a startup gate; there is exactly one.
#[derive(Debug)]
pub struct GateWaiter {
    rx: Receiver<()>,
}

impl GateWaiter {
    /// Blocks until the gate is set, consuming the signal (auto-reset).
    pub fn wait(&self, timeout: Duration) -> Result<(), GateError> {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(GateError::TimedOut(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(GateError::Disconnected),
        }
    }
}

/// Auto-resetting one-slot gate: repeated signals before a wait collapse into one.
pub fn startup_gate() -> (GateSignal, GateWaiter) {
    let (tx, rx) = bounded(1);
    (GateSignal { tx }, GateWaiter { rx })
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Instant};

    use super::*;

    #[test]
    fn signal_before_wait_is_kept() {
        let (signal, waiter) = startup_gate();
        assert!(signal.signal());
        assert_eq!(waiter.wait(Duration::from_millis(10)), Ok(()));
    }

    #[test]
    fn wait_times_out_without_signal() {
        let (_signal, waiter) = startup_gate();
        let started = Instant::now();
        let timeout = Duration::from_millis(30);

        assert_eq!(waiter.wait(timeout), Err(GateError::TimedOut(timeout)));
        assert!(started.elapsed() >= timeout);
    }

    #[test]
    fn gate_resets_after_each_wait() {
        let (signal, waiter) = startup_gate();
        assert!(signal.signal());
        assert!(!signal.signal());

        assert!(waiter.wait(Duration::from_millis(10)).is_ok());
        assert!(waiter.wait(Duration::from_millis(10)).is_err());
    }

    #[test]
    fn signal_from_other_thread_wakes_waiter() {
        let (signal, waiter) = startup_gate();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            signal.signal()
        });

        assert!(waiter.wait(Duration::from_secs(5)).is_ok());
        assert!(handle.join().unwrap());
    }

    #[test]
    fn dropped_signal_reports_disconnect() {
        let (signal, waiter) = startup_gate();
        drop(signal);
        assert_eq!(
            waiter.wait(Duration::from_millis(10)),
            Err(GateError::Disconnected)
        );
    }
}
