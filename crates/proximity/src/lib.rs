//! # transit-proximity
//!
//! Tag bus stops that sit within walking distance of a rail station exit.
//!
//! ## Stages
//!
//! - **Name resolution**: free-text exit labels are fuzzy-matched to a
//!   reference list of stations and their rail lines
//! - **Calibration**: the walking threshold is the median spacing between
//!   consecutive bus stops, after z-score outlier removal
//! - **Tagging**: each exit is joined with its nearest bus stop in a planar
//!   projection, and stops within the threshold inherit the exit's lines
//!
//! ## Example
//!
//! ```
//! use transit_proximity::prelude::*;
//! use geo::Point;
//!
//! let stations = vec![StationLineRecord::from_code_string("Bugis", "EW12 DT14")];
//! let exits = vec![RailExit::new("A", "BUGIS MRT STATION", Some(Point::new(30_300.0, 30_000.0)))];
//! let stops = vec![BusStop::new("01012", Some(Point::new(30_000.0, 30_000.0)))];
//! let routes: Vec<RouteStop> = (0..5)
//!     .map(|i| RouteStop::new("7", 1, i + 1, Some(0.4 * i as f64)))
//!     .collect();
//!
//! // Coordinates above are already SVY21 metres
//! let crs = SourceCrs { bus_stops: Some(Crs::Svy21), rail_exits: Some(Crs::Svy21) };
//!
//! let run = PipelineOrchestrator::default()
//!     .tag(&stops, &routes, &exits, &stations, crs)
//!     .unwrap();
//!
//! assert!(run.rows[0].is_rail_adjacent);
//! assert!(run.rows[0].lines.contains(LineCode::EW));
//! ```

pub mod calibrate;
pub mod error;
pub mod identifiers;
pub mod models;
pub mod pipeline;
pub mod resolver;
pub mod spatial;
pub mod table;
pub mod tagger;

// Re-exports for convenience
pub mod prelude {
    pub use crate::calibrate::{Calibration, CalibratorConfig, DistanceCalibrator};
    pub use crate::error::{
        CalibrationError, DataShapeError, Diagnostics, PipelineError, ProjectionError, Result,
        UnresolvedRecordWarning, WarningKind,
    };
    pub use crate::identifiers::*;
    pub use crate::models::{lines::*, types::*};
    pub use crate::pipeline::{
        Datasets, LineSummary, PipelineConfig, PipelineOrchestrator, RunReport, TableColumns,
        TaggingRun,
    };
    pub use crate::resolver::{ResolverConfig, StationNameResolver};
    pub use crate::spatial::{Crs, Projector};
    pub use crate::table::{BusStopColumns, RailExitColumns, RouteColumns, StationLineColumns, Table};
    pub use crate::tagger::{DedupPolicy, ProximityTagger, SourceCrs, TaggerConfig};
}

pub use prelude::*;
