//! User control: console channel and control/visualization devices

pub mod channel;
pub mod console;
pub mod device;

pub use channel::{ControlSignalChannel, ControlState};
pub use console::{BufReadLines, LineSource, StdinLines};
pub use device::{ConsoleDevice, LedBarDevice, PlayerDevice};

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Lock, carrying on with the data if another thread panicked while holding it
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn wait<'a, T>(cond: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
}
