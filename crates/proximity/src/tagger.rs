//! Tag bus stops that lie within walking distance of a rail exit.
//!
//! Both datasets are projected into a common planar system, then each rail
//! exit is joined with its nearest bus stop. Pairs within the threshold tag
//! their bus stop as rail-adjacent and copy the exit's station and lines
//! onto it. Every input bus stop appears exactly once in the output.

use std::collections::HashSet;

use crate::error::{Diagnostics, ProjectionError, WarningKind};
use crate::models::types::{BusStop, MatchedExit, TaggedBusStop};
use crate::spatial::crs::{Crs, Projector};
use crate::spatial::index::{StopIndex, StopNode};

/// Which join pair wins when a bus stop is the nearest stop of several exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DedupPolicy {
    /// The closest exit; ties go to the earliest exit.
    #[default]
    ClosestDistance,
    /// The earliest surviving exit in input order.
    FirstSeen,
}

/// Tuning for the spatial join.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaggerConfig {
    /// Assigned to a dataset that arrives without a reference system.
    pub default_crs: Crs,

    /// Planar system all distances are measured in.
    pub target_crs: Crs,

    pub dedup: DedupPolicy,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            default_crs: Crs::Wgs84,
            target_crs: Crs::Svy21,
            dedup: DedupPolicy::default(),
        }
    }
}

/// Reference systems declared by the caller for each input dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceCrs {
    pub bus_stops: Option<Crs>,
    pub rail_exits: Option<Crs>,
}

/// How each dataset was brought into the target system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectionReport {
    pub target: Crs,
    pub bus_stops: Crs,
    /// The bus-stop system was the configured default, not declared.
    pub bus_stops_assumed: bool,
    pub rail_exits: Crs,
    pub rail_exits_assumed: bool,
}

/// Output of a tagging pass.
#[derive(Debug, Clone)]
pub struct Tagging {
    pub rows: Vec<TaggedBusStop>,
    pub projection: ProjectionReport,
    /// Exit to nearest-stop pairs produced by the join.
    pub join_pairs: usize,
    /// Pairs within the threshold.
    pub surviving_pairs: usize,
    pub diagnostics: Diagnostics,
}

impl Tagging {
    pub fn adjacent_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_rail_adjacent).count()
    }
}

/// One exit joined with its nearest stop.
#[derive(Debug, Clone, Copy)]
struct JoinPair {
    exit: usize,
    stop: usize,
    distance_m: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ProximityTagger {
    config: TaggerConfig,
}

impl ProximityTagger {
    pub fn new(config: TaggerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    fn projector(&self, dataset: &str, declared: Option<Crs>) -> Result<(Projector, bool), ProjectionError> {
        let assumed = declared.is_none();
        let source = declared.unwrap_or(self.config.default_crs);
        if assumed {
            tracing::info!(dataset, crs = %source, "No reference system declared, assuming default");
        }
        Ok((Projector::new(dataset, source, self.config.target_crs)?, assumed))
    }

    /// Tag `stops` against `exits` using `threshold_m` metres.
    pub fn tag(
        &self,
        stops: &[BusStop],
        exits: &[MatchedExit],
        crs: SourceCrs,
        threshold_m: f64,
    ) -> Result<Tagging, ProjectionError> {
        let (stop_projector, bus_stops_assumed) = self.projector("bus_stops", crs.bus_stops)?;
        let (exit_projector, rail_exits_assumed) = self.projector("rail_exits", crs.rail_exits)?;
        let projection = ProjectionReport {
            target: self.config.target_crs,
            bus_stops: stop_projector.source(),
            bus_stops_assumed,
            rail_exits: exit_projector.source(),
            rail_exits_assumed,
        };

        let mut diagnostics = Diagnostics::new();
        let stops = unique_stops(stops, &mut diagnostics);

        let mut nodes = Vec::with_capacity(stops.len());
        for (row, stop) in stops.iter().enumerate() {
            match stop.location.and_then(|p| stop_projector.project(p)) {
                Some(point) => nodes.push(StopNode::new(row, point)),
                None => diagnostics.warn(
                    WarningKind::UnusableCoordinates,
                    "bus_stops",
                    &stop.code,
                    format!("location {:?} excluded from join", stop.location),
                ),
            }
        }
        let index = StopIndex::new(nodes);

        let mut pairs = Vec::with_capacity(exits.len());
        for (exit_row, matched) in exits.iter().enumerate() {
            let Some(point) = matched.exit.location.and_then(|p| exit_projector.project(p)) else {
                diagnostics.warn(
                    WarningKind::UnusableCoordinates,
                    "rail_exits",
                    &matched.exit.id,
                    format!("location {:?} excluded from join", matched.exit.location),
                );
                continue;
            };
            if let Some((stop, distance_m)) = index.nearest(point) {
                pairs.push(JoinPair {
                    exit: exit_row,
                    stop,
                    distance_m,
                });
            }
        }

        let chosen = choose_pairs(&pairs, stops.len(), threshold_m, self.config.dedup);
        let surviving_pairs = pairs.iter().filter(|p| p.distance_m <= threshold_m).count();

        let rows: Vec<TaggedBusStop> = stops
            .iter()
            .zip(chosen)
            .map(|(stop, pair)| match pair {
                None => TaggedBusStop::untagged((*stop).clone()),
                Some(pair) => {
                    let matched = &exits[pair.exit];
                    let adjacent = pair.distance_m <= threshold_m;
                    TaggedBusStop {
                        stop: (*stop).clone(),
                        is_rail_adjacent: adjacent,
                        matched_station_name: if adjacent { matched.station.clone() } else { None },
                        lines: if adjacent { matched.lines } else { Default::default() },
                        distance_to_nearest_exit: Some(pair.distance_m),
                        nearest_exit: Some(matched.exit.id.clone()),
                    }
                }
            })
            .collect();

        let tagging = Tagging {
            rows,
            projection,
            join_pairs: pairs.len(),
            surviving_pairs,
            diagnostics,
        };
        tracing::debug!(
            stops = tagging.rows.len(),
            indexed = index.len(),
            join_pairs = tagging.join_pairs,
            surviving_pairs,
            adjacent = tagging.adjacent_count(),
            threshold_m,
            "Tagged bus stops"
        );
        Ok(tagging)
    }
}

/// First occurrence of each stop code, in input order.
fn unique_stops<'a>(stops: &'a [BusStop], diagnostics: &mut Diagnostics) -> Vec<&'a BusStop> {
    let mut seen = HashSet::new();
    stops
        .iter()
        .enumerate()
        .filter(|(row, stop)| {
            let first = seen.insert(stop.code.clone());
            if !first {
                diagnostics.warn(
                    WarningKind::DuplicateStopCode,
                    "bus_stops",
                    &stop.code,
                    format!("repeated at row {row}, keeping first occurrence"),
                );
            }
            first
        })
        .map(|(_, stop)| stop)
        .collect()
}

/// Pick at most one pair per stop.
///
/// Pairs within the threshold are preferred under `policy`. A stop with only
/// out-of-threshold pairs keeps its closest one so the distance is still
/// reported.
fn choose_pairs(
    pairs: &[JoinPair],
    stop_count: usize,
    threshold_m: f64,
    policy: DedupPolicy,
) -> Vec<Option<JoinPair>> {
    let mut chosen: Vec<Option<JoinPair>> = vec![None; stop_count];

    for pair in pairs {
        let slot = &mut chosen[pair.stop];
        let replace = match slot {
            None => true,
            Some(current) => {
                let current_within = current.distance_m <= threshold_m;
                let candidate_within = pair.distance_m <= threshold_m;
                match (current_within, candidate_within) {
                    (false, true) => true,
                    (true, false) => false,
                    (true, true) => {
                        policy == DedupPolicy::ClosestDistance && pair.distance_m < current.distance_m
                    }
                    (false, false) => pair.distance_m < current.distance_m,
                }
            }
        };
        if replace {
            *slot = Some(*pair);
        }
    }

    chosen
}
