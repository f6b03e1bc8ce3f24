//! Core records flowing through the tagging pipeline.
//!
//! Locations use the `geo` axis convention: `x` is longitude or easting,
//! `y` is latitude or northing. A `None` location marks a record whose
//! coordinates were missing or unparseable at ingestion.

use geo::Point;

use crate::identifiers::*;
use crate::models::lines::LineFlags;

// ============================================================================
// Bus network
// ============================================================================

/// A physical bus stop.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusStop {
    pub code: StopCode,
    pub road_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<Point>,
}

impl BusStop {
    pub fn new(code: impl Into<StopCode>, location: Option<Point>) -> Self {
        Self {
            code: code.into(),
            road_name: None,
            description: None,
            location,
        }
    }
}

/// Direction of travel on a bus service (1 or 2 in operator data).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Direction(pub u8);

/// One stop in the ordered stop sequence of a bus service.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteStop {
    pub service: ServiceNumber,
    pub direction: Direction,
    pub stop_sequence: u32,
    pub stop_code: Option<StopCode>,
    /// Cumulative distance along the route, in kilometres.
    pub distance_km: Option<f64>,
}

impl RouteStop {
    pub fn new(
        service: impl Into<ServiceNumber>,
        direction: u8,
        stop_sequence: u32,
        distance_km: Option<f64>,
    ) -> Self {
        Self {
            service: service.into(),
            direction: Direction(direction),
            stop_sequence,
            stop_code: None,
            distance_km,
        }
    }
}

// ============================================================================
// Rail network
// ============================================================================

/// A physical rail station exit with its free-text station label.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RailExit {
    pub id: ExitIdentifier,
    /// Raw label, e.g. "BUGIS MRT STATION".
    pub station_label: Option<String>,
    pub location: Option<Point>,
}

impl RailExit {
    pub fn new(
        id: impl Into<ExitIdentifier>,
        station_label: impl Into<String>,
        location: Option<Point>,
    ) -> Self {
        Self {
            id: id.into(),
            station_label: Some(station_label.into()),
            location,
        }
    }
}

/// A rail exit after name resolution.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchedExit {
    pub exit: RailExit,
    /// `None` when no canonical name cleared the minimum score.
    pub station: Option<StationName>,
    /// Similarity of the best candidate (0-100), present even when unmatched.
    pub score: Option<f64>,
    pub lines: LineFlags,
}

impl MatchedExit {
    pub fn unmatched(exit: RailExit, score: Option<f64>) -> Self {
        Self {
            exit,
            station: None,
            score,
            lines: LineFlags::default(),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.station.is_some()
    }
}

// ============================================================================
// Output
// ============================================================================

/// A bus stop with its rail proximity tag.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaggedBusStop {
    pub stop: BusStop,
    pub is_rail_adjacent: bool,
    pub matched_station_name: Option<StationName>,
    pub lines: LineFlags,
    /// Planar distance in metres to the exit this stop was joined with.
    pub distance_to_nearest_exit: Option<f64>,
    pub nearest_exit: Option<ExitIdentifier>,
}

impl TaggedBusStop {
    /// A stop that no rail exit was joined with.
    pub fn untagged(stop: BusStop) -> Self {
        Self {
            stop,
            is_rail_adjacent: false,
            matched_station_name: None,
            lines: LineFlags::default(),
            distance_to_nearest_exit: None,
            nearest_exit: None,
        }
    }

    pub fn code(&self) -> &StopCode {
        &self.stop.code
    }
}
