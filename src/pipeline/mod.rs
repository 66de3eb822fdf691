use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod gate;
pub mod latest;
pub mod sensor;
pub mod simulated;
pub mod source;

// Re-exports for convenience
pub use latest::LatestFrame;
pub use sensor::{SensorBackend, SensorService, connect_sensor};
pub use source::FrameSource;

// Slots only ever hold whole values, so a panicked writer leaves nothing torn.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
