//! Transport abstractions: the outbound port, inbound events, and normalization
//! of events into the context the dispatcher works with.

pub mod normalize;
pub mod port;
pub mod types;
