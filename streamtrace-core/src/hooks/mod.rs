//! Pipeline hooks
//!
//! [`FilterHooks`] is the interface a host pipeline calls into; [`TraceFilter`]
//! is the implementation that traces every event and simulates partial I/O.

pub mod trace;
pub mod traits;

pub use trace::TraceFilter;
pub use traits::{body_available, ChannelRegistration, FilterHooks, FilterInstance, FilterRole};
