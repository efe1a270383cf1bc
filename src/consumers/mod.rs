//! Durable log consumers.
//!
//! # Data Flow
//! ```text
//! lineage topic
//!     → lineage.rs (decode, resolve namespace, back-fill job.namespace)
//!     → sink.rs (POST {base}/api/v1/lineage with X-Namespace, 201 = success)
//!     → commit (always)
//!
//! spans / metrics topics
//!     → telemetry.rs (decode, resolve namespace, normalise into records)
//!     → batch.rs (size trigger inline, time trigger inline + timer task)
//!     → store.rs (bulk insert into ClickHouse or memory)
//!     → commit (always)
//! ```
//!
//! # Design Decisions
//! - One pump task per consumer group; the batcher adds one timer task
//! - Flushes are serialised; a flush swaps the batch out before writing
//! - A failed write drops its snapshot, logged with the row count
//! - Forwarding is best-effort, with opt-in bounded retry on 5xx and
//!   transport errors

pub mod batch;
pub mod lineage;
pub mod sink;
pub mod store;
pub mod telemetry;

pub use batch::Batch;
pub use lineage::{ForwardOutcome, LineageForwarder};
pub use sink::{ForwardError, LineageSink, MarquezSink};
pub use store::{ClickHouseStore, ColumnarStore, MemoryStore, StoreCall, StoreError};
pub use telemetry::{resolve_namespace, FlushOutcome, FlushTimer, TelemetryBatcher, FALLBACK_NAMESPACE};
