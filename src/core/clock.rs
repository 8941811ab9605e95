//! core::clock
//!
//! Time source for POSIX timestamps.
//!
//! Operations read the clock exactly once per request and carry the value
//! through to both the stored records and the response. Tests substitute a
//! [`FixedClock`] to make timestamps deterministic.

use std::sync::atomic::{AtomicU32, Ordering};

/// A source of wall-clock time in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current time in seconds.
    fn now_secs(&self) -> u32;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u32 {
        // Saturates instead of wrapping for pre-epoch or post-2106 clocks.
        let secs = chrono::Utc::now().timestamp();
        u32::try_from(secs.max(0)).unwrap_or(u32::MAX)
    }
}

/// A manually driven clock.
#[derive(Debug, Default)]
pub struct FixedClock {
    secs: AtomicU32,
}

impl FixedClock {
    /// Create a clock frozen at `secs`.
    pub fn new(secs: u32) -> Self {
        Self {
            secs: AtomicU32::new(secs),
        }
    }

    /// Move the clock to `secs`.
    pub fn set(&self, secs: u32) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_secs(&self) -> u32 {
        self.secs.load(Ordering::SeqCst)
    }
}
