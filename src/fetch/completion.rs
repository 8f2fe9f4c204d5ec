//! Single-fire result delivery.

use std::sync::{Arc, Mutex};

type Callback<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Delivery gate shared by every path that can finish a call.
///
/// The transport result, an idle timeout, and a failing request body stream
/// can all try to report the outcome of the same call. Whichever gets here
/// first invokes the callback; later attempts are dropped.
pub(crate) struct Completion<T> {
    callback: Arc<Mutex<Option<Callback<T>>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> Completion<T> {
    pub(crate) fn new<F>(callback: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        Self {
            callback: Arc::new(Mutex::new(Some(Box::new(callback)))),
        }
    }

    /// Delivers `value` if nothing has been delivered yet.
    ///
    /// Returns `true` if this call invoked the callback.
    pub(crate) fn deliver(&self, value: T) -> bool {
        let callback = match self.callback.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match callback {
            // Invoked outside the lock so the callback may clone or query this gate
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    /// `true` once a value has been delivered.
    pub(crate) fn is_settled(&self) -> bool {
        match self.callback.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}
