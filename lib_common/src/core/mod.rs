//! # Core Engine Module
//!
//! The exchange-rate cache and everything needed to answer range queries
//! against it. Components, in dependency order:
//!
//! - **`record`**: the semi-structured row and its canonical date key.
//! - **`cache_store`**: the mutex-guarded snapshot; `replace_all` and
//!   `snapshot_and_filter` are the only ways in.
//! - **`loader`**: the one-time startup preload from a `RangeSource`.
//! - **`request`**: ordered field resolution for loosely shaped messages.
//! - **`query_engine`**: the inclusive, lexicographic range filter.
//! - **`response`**: the outbound wire shape.
//! - **`handler`**: ties the above together behind a `PluginHandler`.
//! - **`registry`** / **`dispatcher`**: name-based inbound routing and the
//!   per-connection send-back capability.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Cached row type and date-key canonicalization.
pub mod record;
/// The single-writer, multi-reader record snapshot.
pub mod cache_store;
/// Inclusive date-range filtering.
pub mod query_engine;
/// Field resolution for inbound messages.
pub mod request;
/// Outbound reply construction.
pub mod response;
/// Per-connection outbound queues and the `Outbox` capability.
pub mod dispatcher;
/// Routing of inbound messages to named handlers.
pub mod registry;
/// The exchange-rate query handler.
pub mod handler;
/// Startup preload from an external range-query source.
pub mod loader;

// --- Public API Re-exports ---
pub use cache_store::CacheStore;
pub use dispatcher::{ConnectionId, Dispatcher, Outbox, SendError};
pub use handler::RateQueryHandler;
pub use loader::{preload, LoadReport, PreloadWindow, RangePredicate, RangeQuery, RangeSource, SourceError};
pub use query_engine::DateRange;
pub use record::{Record, TRADE_DATE_KEY};
pub use registry::{PluginHandler, PluginRegistry, RouteOutcome};
pub use request::{resolve_field, FieldValue, InboundRequest, RequestError};
pub use response::OutboundResponse;
