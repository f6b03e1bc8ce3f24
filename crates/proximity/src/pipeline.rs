//! Run resolution, calibration, and tagging end to end.
//!
//! Each call recomputes everything from its inputs. Nothing is cached
//! between runs, so identical inputs always give identical output.

use std::collections::BTreeMap;

use strum::{EnumCount, IntoEnumIterator};

use crate::calibrate::{Calibration, CalibratorConfig, DistanceCalibrator};
use crate::error::{CalibrationError, Diagnostics, Result, WarningKind};
use crate::models::lines::{LineCode, StationLineRecord};
use crate::models::types::{BusStop, RailExit, RouteStop, TaggedBusStop};
use crate::resolver::{ResolverConfig, StationNameResolver};
use crate::spatial::crs::Crs;
use crate::table::{self, BusStopColumns, RailExitColumns, RouteColumns, StationLineColumns, Table};
use crate::tagger::{ProximityTagger, SourceCrs, TaggerConfig};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    pub resolver: ResolverConfig,
    pub calibrator: CalibratorConfig,
    pub tagger: TaggerConfig,
    /// Fixed threshold in metres. Calibration is skipped when set.
    pub threshold_override: Option<f64>,
}

/// Column layouts for every input table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableColumns {
    pub bus_stops: BusStopColumns,
    pub bus_routes: RouteColumns,
    pub rail_exits: RailExitColumns,
    pub station_lines: StationLineColumns,
}

// ============================================================================
// Inputs
// ============================================================================

/// Typed input records for one run.
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub bus_stops: Vec<BusStop>,
    pub bus_routes: Vec<RouteStop>,
    pub rail_exits: Vec<RailExit>,
    pub station_lines: Vec<StationLineRecord>,
    pub crs: SourceCrs,
}

impl Datasets {
    /// Validate and convert loaded tables. Fails on the first missing column
    /// or malformed value.
    pub fn from_tables(
        bus_stops: &Table,
        bus_routes: &Table,
        rail_exits: &Table,
        station_lines: &Table,
        columns: &TableColumns,
    ) -> Result<Self> {
        Ok(Self {
            bus_stops: table::bus_stops(bus_stops, &columns.bus_stops)?,
            bus_routes: table::route_stops(bus_routes, &columns.bus_routes)?,
            rail_exits: table::rail_exits(rail_exits, &columns.rail_exits)?,
            station_lines: table::station_lines(station_lines, &columns.station_lines)?,
            crs: SourceCrs::default(),
        })
    }

    pub fn with_crs(mut self, crs: SourceCrs) -> Self {
        self.crs = crs;
        self
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// Metadata describing how a run was produced.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RunReport {
    pub threshold_m: f64,
    /// True when the threshold came from configuration rather than calibration.
    pub threshold_supplied: bool,
    pub calibration: Option<Calibration>,

    pub target_crs: Crs,
    pub bus_stop_crs: Crs,
    pub bus_stop_crs_assumed: bool,
    pub rail_exit_crs: Crs,
    pub rail_exit_crs_assumed: bool,

    pub bus_stops: usize,
    pub rail_exits: usize,
    pub matched_exits: usize,
    pub adjacent_stops: usize,

    pub warning_counts: BTreeMap<WarningKind, usize>,
    pub diagnostics: Diagnostics,
}

/// Tagged bus stops and the metadata of the run that produced them.
#[derive(Debug, Clone)]
pub struct TaggingRun {
    pub rows: Vec<TaggedBusStop>,
    pub report: RunReport,
}

impl TaggingRun {
    pub fn line_summary(&self) -> LineSummary {
        LineSummary::from_rows(&self.rows)
    }
}

/// Rail-adjacent bus stops per line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineSummary {
    pub adjacent_stops: usize,
    counts: [usize; LineCode::COUNT],
}

impl LineSummary {
    pub fn from_rows(rows: &[TaggedBusStop]) -> Self {
        let mut counts = [0; LineCode::COUNT];
        let mut adjacent_stops = 0;
        for row in rows.iter().filter(|r| r.is_rail_adjacent) {
            adjacent_stops += 1;
            for line in row.lines.iter() {
                counts[line as usize] += 1;
            }
        }
        Self {
            adjacent_stops,
            counts,
        }
    }

    pub fn count(&self, line: LineCode) -> usize {
        self.counts[line as usize]
    }

    /// Every tracked line with its count, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (LineCode, usize)> + '_ {
        LineCode::iter().map(|line| (line, self.count(line)))
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct PipelineOrchestrator {
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Tag `bus_stops` by proximity to the resolved `rail_exits`.
    pub fn tag(
        &self,
        bus_stops: &[BusStop],
        bus_routes: &[RouteStop],
        rail_exits: &[RailExit],
        station_lines: &[StationLineRecord],
        crs: SourceCrs,
    ) -> Result<TaggingRun> {
        let mut diagnostics = Diagnostics::new();

        let resolver = StationNameResolver::new(station_lines, self.config.resolver.clone());
        let resolution = resolver.resolve(rail_exits);
        tracing::info!(
            exits = rail_exits.len(),
            kept = resolution.exits.len(),
            matched = resolution.matched_count(),
            "Resolved station names"
        );
        let matched_exits = resolution.matched_count();
        diagnostics.extend(resolution.diagnostics);

        let (threshold_m, calibration) = match self.config.threshold_override {
            Some(threshold_m) => {
                if !threshold_m.is_finite() || threshold_m <= 0.0 {
                    return Err(CalibrationError::Degenerate {
                        value_km: threshold_m / 1000.0,
                    }
                    .into());
                }
                tracing::info!(threshold_m, "Using supplied threshold, calibration skipped");
                (threshold_m, None)
            }
            None => {
                let calibrator = DistanceCalibrator::new(self.config.calibrator.clone());
                let (calibration, warnings) = calibrator.calibrate(bus_routes)?;
                diagnostics.extend(warnings);
                tracing::info!(
                    threshold_m = calibration.threshold_m,
                    samples = calibration.samples,
                    outliers_removed = calibration.outliers_removed,
                    mean_km = calibration.mean_km,
                    std_dev_km = calibration.std_dev_km,
                    "Calibrated walking threshold"
                );
                (calibration.threshold_m, Some(calibration))
            }
        };

        let tagger = ProximityTagger::new(self.config.tagger.clone());
        let tagging = tagger.tag(bus_stops, &resolution.exits, crs, threshold_m)?;
        let adjacent_stops = tagging.adjacent_count();
        tracing::info!(
            stops = tagging.rows.len(),
            adjacent = adjacent_stops,
            "Tagged bus stops"
        );
        diagnostics.extend(tagging.diagnostics);

        let projection = tagging.projection;
        let report = RunReport {
            threshold_m,
            threshold_supplied: calibration.is_none(),
            calibration,
            target_crs: projection.target,
            bus_stop_crs: projection.bus_stops,
            bus_stop_crs_assumed: projection.bus_stops_assumed,
            rail_exit_crs: projection.rail_exits,
            rail_exit_crs_assumed: projection.rail_exits_assumed,
            bus_stops: tagging.rows.len(),
            rail_exits: rail_exits.len(),
            matched_exits,
            adjacent_stops,
            warning_counts: diagnostics.counts(),
            diagnostics,
        };

        Ok(TaggingRun {
            rows: tagging.rows,
            report,
        })
    }

    /// Run over pre-typed datasets.
    pub fn run(&self, datasets: &Datasets) -> Result<TaggingRun> {
        self.tag(
            &datasets.bus_stops,
            &datasets.bus_routes,
            &datasets.rail_exits,
            &datasets.station_lines,
            datasets.crs,
        )
    }
}
