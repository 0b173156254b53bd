//! Overlap guard: at most one in-flight operation per key
//!
//! A caller that finds its key already taken is expected to skip, not wait.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone, Default)]
pub struct SingleFlight {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `None` while another guard for it is alive.
    pub fn try_acquire(&self, key: impl Into<String>) -> Option<FlightGuard> {
        let key = key.into();
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(FlightGuard {
            key,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.in_flight.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.in_flight.lock().is_empty()
    }
}

/// Releases its key on drop.
pub struct FlightGuard {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}
