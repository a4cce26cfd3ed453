//! Async runtime layer for the index sync engine.
//!
//! Every other crate in the workspace goes through this crate instead of
//! depending on tokio directly, so the executor choice stays in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning and execution
//! - `time`: Time-related operations (sleep, duration, instant)
//! - `sync`: Synchronization primitives (Mutex, RwLock, channels, cancellation)
//! - `serial`: Single-worker job queue used to serialize sync passes
//!
//! # Examples
//!
//! ```rust
//! use core_async::serial::SerialExecutor;
//!
//! # async fn example() {
//! let executor = SerialExecutor::spawn("example");
//! executor.submit(async {
//!     // Runs strictly after every previously submitted job.
//! });
//! executor.shutdown().await;
//! # }
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod runtime;
pub mod serial;
pub mod sync;
pub mod task;
pub mod time;

pub use serial::SerialExecutor;
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
