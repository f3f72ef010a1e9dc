//! # Resilience Primitives
//!
//! Bounded-retry execution for calls against shared infrastructure (database
//! inserts, downstream publishing).
//!
//! ## Retry model
//!
//! [`RetryPolicy`] describes exponential backoff with a capped interval and
//! optional attempt/elapsed bounds; unset bounds retry indefinitely.
//! [`retry_with_policy`] drives an async operation under a policy, consulting
//! an `is_retryable` classifier so fatal errors (e.g. an insert rejected for
//! a missing mandatory field) short-circuit without backoff.

pub mod retry;

pub use retry::{retry_with_policy, RetryPolicy};
