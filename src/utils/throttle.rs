//! Log throttling utility
//!
//! Limits how often the same warning is recorded while counting the
//! occurrences that were swallowed in between, so a producer flooding the
//! report queue does not flood the log as well.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct KeyState {
    last_logged: Instant,
    suppressed: u64,
}

/// Log throttler keyed by static message identifiers
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use vhid::utils::LogThrottler;
///
/// let throttler = LogThrottler::new(Duration::from_secs(5));
///
/// // First occurrence is logged, nothing was suppressed before it
/// assert_eq!(throttler.check("overflow"), Some(0));
///
/// // Subsequent occurrences within 5 seconds are swallowed
/// assert_eq!(throttler.check("overflow"), None);
/// ```
pub struct LogThrottler {
    keys: Mutex<HashMap<&'static str, KeyState>>,
    interval: Duration,
}

impl LogThrottler {
    /// Create a new log throttler with the specified interval
    pub fn new(interval: Duration) -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            interval,
        }
    }

    /// Create a new log throttler with interval specified in seconds
    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Record one occurrence of `key`
    ///
    /// Returns `Some(n)` when the occurrence should be logged, where `n` is the
    /// number of occurrences swallowed since the previous logged one. Returns
    /// `None` when the occurrence is throttled.
    pub fn check(&self, key: &'static str) -> Option<u64> {
        let now = Instant::now();
        let mut keys = self.keys.lock();
        match keys.get_mut(key) {
            Some(state) if now.duration_since(state.last_logged) < self.interval => {
                state.suppressed += 1;
                None
            }
            Some(state) => {
                let suppressed = std::mem::take(&mut state.suppressed);
                state.last_logged = now;
                Some(suppressed)
            }
            None => {
                keys.insert(
                    key,
                    KeyState {
                        last_logged: now,
                        suppressed: 0,
                    },
                );
                Some(0)
            }
        }
    }

    /// Forget `key`, so its next occurrence is logged immediately
    pub fn clear(&self, key: &'static str) {
        self.keys.lock().remove(key);
    }
}

impl Default for LogThrottler {
    fn default() -> Self {
        Self::with_secs(5)
    }
}

/// Throttled warning: logs through `tracing::warn!` and appends the number of
/// swallowed repetitions when there were any.
#[macro_export]
macro_rules! warn_throttled {
    ($throttler:expr, $key:expr, $($arg:tt)*) => {
        match $throttler.check($key) {
            Some(0) => tracing::warn!($($arg)*),
            Some(n) => tracing::warn!(suppressed = n, $($arg)*),
            None => {}
        }
    };
}
