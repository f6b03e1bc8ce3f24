//! Records, line codes, and line membership.

pub mod lines;
pub mod types;

// Re-exports for convenience
pub use lines::{LineCode, LineFlags, StationLineRecord, EXCLUDED_LINE_PREFIXES};
pub use types::{BusStop, Direction, MatchedExit, RailExit, RouteStop, TaggedBusStop};
