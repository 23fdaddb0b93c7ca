//! Shared types for the cross-telescope trigger coordination system
//!
//! Contains only truly shared material: the event and dispatch-record domain
//! types (which double as the feed wire format and the stored record schema),
//! the shared error type, and tracing setup. Coordinator-internal types live
//! in the coordinator crate.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
