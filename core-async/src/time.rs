//! Time-related abstractions.
//!
//! Re-exports `tokio::time` for sleeping and timeouts, and the standard
//! library's clock types.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(10)).await;
//!     println!("Took {:?}", start.elapsed());
//! }
//! ```

pub use tokio::time::{interval, sleep, sleep_until, timeout, Interval, Sleep, Timeout};

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Returns the current time as milliseconds since UNIX_EPOCH.
///
/// # Examples
///
/// ```rust
/// use core_async::time::now_millis;
///
/// let timestamp = now_millis();
/// assert!(timestamp > 0);
/// ```
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns the current time as seconds since UNIX_EPOCH.
pub fn now_secs() -> u64 {
    now_millis() / 1000
}
