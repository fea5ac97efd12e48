//! Chainlb Sync Library
//!
//! Per-key mutual exclusion for callers that must not process the same
//! entity concurrently, with a background reaper that force-releases and
//! evicts locks older than the configured lifetime.

pub mod lock;

pub use lock::{LockGuard, LockRegistry};
