//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics exporter → Durable log → Components → Signal listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → HTTP drain + log flush
//!                                 → consumer pumps stop → final batch flush → store close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: log first, then components, listener bound before spawn
//! - Every component owns its own shutdown receiver
//! - The final telemetry flush is bounded by a timeout

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, DurableLog, Role, StartupError};
