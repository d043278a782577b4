//! Core types and pipeline wiring for binday, the bin-day schedule lookup.

/// Polling coordinator and per-category sensor states.
pub mod coordinator;
/// Collection date parsing, day arithmetic, and clocks.
pub mod dates;
/// Domain models and identifiers shared by all providers.
pub mod model;
/// Bundle of ports implementing a single council.
pub mod plugin;
/// Traits describing the provider interfaces.
pub mod ports;
/// High-level service facade used by clients.
pub mod service;
/// Per-address resolution state owned by callers.
pub mod session;

pub use coordinator::*;
pub use dates::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
pub use session::*;
