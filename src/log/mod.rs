//! Durable log client.
//!
//! # Data Flow
//! ```text
//! gateway item
//!     → publisher.rs (encode JSON, key + headers from keys.rs)
//!     → LogProducer::send (await acknowledgment, bounded by timeout)
//!     → topic partition chosen by key
//!
//! consumer pump
//!     → LogConsumer::recv → ConsumedMessage { topic, partition, offset, key, headers }
//!     → handler
//!     → LogConsumer::commit
//! ```
//!
//! # Design Decisions
//! - Backends sit behind the `LogProducer`/`LogConsumer` traits; memory.rs
//!   is always built, kafka.rs only with the `kafka` feature
//! - Publishing reports `bool`; the gateway counts, it does not propagate
//! - Offsets are committed after handling, whatever the outcome

pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod keys;
pub mod memory;
pub mod publisher;
pub mod record;
pub mod transport;

pub use error::LogError;
pub use keys::{message_headers, message_key, namespace_from_key, EVENT_TYPE_HEADER, NAMESPACE_HEADER};
pub use memory::{MemoryConsumer, MemoryLog};
pub use publisher::{EventPublisher, Topics};
pub use record::{ConsumedMessage, Delivery, LogMessage};
pub use transport::{LogConsumer, LogProducer};
