use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Starts out holding a value which may be taken out exactly once, from any thread. Used for
/// join handles that both an explicit shutdown path and a `Drop` fallback may want to consume.
pub(crate) struct TakeCell<T> {
    taken: AtomicBool,
    data: Mutex<Option<T>>,
}

impl<T> TakeCell<T> {
    pub(crate) fn new(val: T) -> Self {
        Self {
            taken: AtomicBool::new(false),
            data: Mutex::new(Some(val)),
        }
    }

    /// If the cell has not already been taken from, takes the value and returns it
    pub(crate) fn take_once(&self) -> Option<T> {
        if self.taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        self.data.lock().take()
    }
}
