//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! failed call (lineage forward, log consume)
//!     → backoff.rs (exponential delay with jitter, capped)
//!     → sleep, then try again
//! ```
//!
//! # Design Decisions
//! - Jitter spreads retries from many consumers
//! - Callers own their retry budgets; backoff only computes delays

pub mod backoff;
