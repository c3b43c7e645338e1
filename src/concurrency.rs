//! Concurrency control.
//!
//! Strict two-phase locking at page granularity: transactions take shared
//! or exclusive page locks as they go and drop everything at commit/abort.
//! Deadlocks are detected at acquisition time on a waits-for graph.

pub mod lock;

pub use lock::{LockManager, LockMode};
