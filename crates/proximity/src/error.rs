//! Error taxonomy for the tagging pipeline.
//!
//! Fatal failures are `thiserror` enums that abort a run. Per-record
//! problems are collected as [`UnresolvedRecordWarning`]s in a
//! [`Diagnostics`] accumulator and reported at the end of the run.

use std::collections::BTreeMap;
use std::fmt;

use crate::spatial::crs::Crs;

/// An input table does not have the shape the pipeline needs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataShapeError {
    #[error("table `{table}` is missing required column `{column}`")]
    MissingColumn { table: String, column: String },

    #[error("table `{table}` column `{column}` has {found} rows, expected {expected}")]
    RaggedColumn {
        table: String,
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("table `{table}` row {row}: invalid `{column}` value {value:?}")]
    InvalidValue {
        table: String,
        column: String,
        row: usize,
        value: String,
    },
}

/// The walking-distance threshold could not be derived.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("insufficient route data: {groups} usable service groups, {samples} spacing samples")]
    InsufficientData { groups: usize, samples: usize },

    #[error("calibrated threshold is degenerate: {value_km} km")]
    Degenerate { value_km: f64 },

    #[error("invalid z-score cutoff: {0}")]
    InvalidCutoff(f64),
}

/// Coordinates of a dataset cannot be brought into the common planar space.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("target reference system {0} is not planar")]
    NonPlanarTarget(Crs),

    #[error("dataset `{dataset}`: cannot reproject from {from} to {to}")]
    Unsupported { dataset: String, from: Crs, to: Crs },

    #[error("invalid UTM zone {0} (expected 1-60)")]
    InvalidUtmZone(u8),

    #[error("unknown reference system {0:?}")]
    UnknownCrs(String),
}

/// Any fatal pipeline failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    DataShape(#[from] DataShapeError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

// ============================================================================
// Non-fatal warnings
// ============================================================================

/// Why a single record was excluded from a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WarningKind {
    /// Exit label carries a light-rail marker.
    LightRailExcluded,
    /// Exit label is empty or missing.
    EmptyLabel,
    /// No canonical station cleared the minimum score.
    UnmatchedLabel,
    /// Coordinates missing, unparseable, or outside the valid range.
    UnusableCoordinates,
    /// Route stop without a cumulative distance.
    MissingRouteDistance,
    /// Stop code repeated in the bus-stop table.
    DuplicateStopCode,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WarningKind::LightRailExcluded => "light rail excluded",
            WarningKind::EmptyLabel => "empty station label",
            WarningKind::UnmatchedLabel => "unmatched station label",
            WarningKind::UnusableCoordinates => "unusable coordinates",
            WarningKind::MissingRouteDistance => "missing route distance",
            WarningKind::DuplicateStopCode => "duplicate stop code",
        };
        f.write_str(s)
    }
}

/// A single record that a stage skipped or could not resolve.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UnresolvedRecordWarning {
    pub kind: WarningKind,
    pub dataset: &'static str,
    /// Identifier of the offending record (stop code, exit id, row index).
    pub record: String,
    pub detail: String,
}

impl fmt::Display for UnresolvedRecordWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} {}]: {}",
            self.kind, self.dataset, self.record, self.detail
        )
    }
}

/// Accumulates per-record warnings across the stages of one run.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostics {
    warnings: Vec<UnresolvedRecordWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and emit it as a `tracing` event.
    pub fn warn(
        &mut self,
        kind: WarningKind,
        dataset: &'static str,
        record: impl fmt::Display,
        detail: impl Into<String>,
    ) {
        let warning = UnresolvedRecordWarning {
            kind,
            dataset,
            record: record.to_string(),
            detail: detail.into(),
        };
        match kind {
            // Expected by construction, so kept out of the warn stream
            WarningKind::LightRailExcluded => tracing::debug!(%warning, "Record skipped"),
            _ => tracing::warn!(%warning, "Record skipped"),
        }
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn warnings(&self) -> &[UnresolvedRecordWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Per-kind totals, in a stable order.
    pub fn counts(&self) -> BTreeMap<WarningKind, usize> {
        let mut counts = BTreeMap::new();
        for warning in &self.warnings {
            *counts.entry(warning.kind).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataShapeError::MissingColumn {
            table: "bus_stops".into(),
            column: "Latitude".into(),
        };
        assert_eq!(
            err.to_string(),
            "table `bus_stops` is missing required column `Latitude`"
        );

        let err = CalibrationError::InsufficientData {
            groups: 0,
            samples: 0,
        };
        assert_eq!(
            err.to_string(),
            "insufficient route data: 0 usable service groups, 0 spacing samples"
        );

        let err: PipelineError = ProjectionError::NonPlanarTarget(Crs::Wgs84).into();
        assert_eq!(err.to_string(), "target reference system EPSG:4326 is not planar");
    }

    #[test]
    fn test_diagnostics_counts() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn(WarningKind::UnmatchedLabel, "rail_exits", "E1", "best score 12");
        diagnostics.warn(WarningKind::UnmatchedLabel, "rail_exits", "E2", "best score 30");
        diagnostics.warn(WarningKind::UnusableCoordinates, "bus_stops", "01012", "no latitude");

        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics.count(WarningKind::UnmatchedLabel), 2);
        assert_eq!(diagnostics.count(WarningKind::EmptyLabel), 0);

        let counts = diagnostics.counts();
        assert_eq!(counts.get(&WarningKind::UnusableCoordinates), Some(&1));
    }

    #[test]
    fn test_diagnostics_extend() {
        let mut a = Diagnostics::new();
        a.warn(WarningKind::EmptyLabel, "rail_exits", 3, "blank");
        let mut b = Diagnostics::new();
        b.warn(WarningKind::DuplicateStopCode, "bus_stops", "01012", "row 7");

        a.extend(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.warnings()[1].record, "01012");
    }
}
