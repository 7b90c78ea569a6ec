//! Exchange instrumentation: raw phase timestamps in, serializable
//! measurements out.

mod collector;
mod measurement;
mod phase;
mod qlog;

pub use collector::Collector;
pub use measurement::Measurement;
pub use phase::{Phase, PhaseTiming};
pub use qlog::QlogEvent;
