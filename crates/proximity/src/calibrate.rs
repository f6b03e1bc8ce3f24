//! Derive the walking-distance threshold from bus stop spacing.
//!
//! The threshold is the median gap between consecutive stops on the same
//! service and direction, after discarding gaps whose z-score against the
//! whole gap distribution exceeds a cutoff.
//!
//! Outlier filtering is a single pass over the unfiltered distribution; the
//! mean and deviation are not recomputed after removal. This is not a fully
//! robust estimator but keeps thresholds stable against the reference data.

use std::collections::BTreeMap;

use crate::error::{CalibrationError, Diagnostics, WarningKind};
use crate::identifiers::ServiceNumber;
use crate::models::types::{Direction, RouteStop};

const DATASET: &str = "bus_routes";

/// Tuning for threshold calibration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibratorConfig {
    /// Gaps with |z| above this are discarded.
    pub z_cutoff: f64,

    /// Groups yielding fewer gaps than this contribute nothing.
    pub min_group_samples: usize,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            z_cutoff: 3.5,
            min_group_samples: 2,
        }
    }
}

/// A calibrated threshold and the statistics behind it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Calibration {
    pub threshold_km: f64,
    pub threshold_m: f64,
    /// (service, direction) groups that contributed gaps.
    pub groups: usize,
    /// Gaps before outlier removal.
    pub samples: usize,
    pub outliers_removed: usize,
    /// Mean of the unfiltered gaps, km.
    pub mean_km: f64,
    /// Population standard deviation of the unfiltered gaps, km.
    pub std_dev_km: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DistanceCalibrator {
    config: CalibratorConfig,
}

impl DistanceCalibrator {
    pub fn new(config: CalibratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalibratorConfig {
        &self.config
    }

    /// Consecutive-stop gaps in km, grouped by service and direction.
    ///
    /// Groups are visited in (service, direction) order and stops by
    /// sequence, so the output order is deterministic. A gap is only taken
    /// between neighbouring stops that both have a distance.
    pub fn spacing_samples(
        &self,
        routes: &[RouteStop],
        diagnostics: &mut Diagnostics,
    ) -> (Vec<f64>, usize) {
        let mut groups: BTreeMap<(&ServiceNumber, Direction), Vec<&RouteStop>> = BTreeMap::new();
        for stop in routes {
            groups
                .entry((&stop.service, stop.direction))
                .or_default()
                .push(stop);
        }

        let mut samples = Vec::new();
        let mut contributing = 0;

        for ((service, direction), mut stops) in groups {
            stops.sort_by_key(|s| s.stop_sequence);

            for stop in stops.iter().filter(|s| s.distance_km.is_none()) {
                diagnostics.warn(
                    WarningKind::MissingRouteDistance,
                    DATASET,
                    format!("{}/{}#{}", service, direction.0, stop.stop_sequence),
                    "no cumulative distance",
                );
            }

            let gaps: Vec<f64> = stops
                .windows(2)
                .filter_map(|pair| Some(pair[1].distance_km? - pair[0].distance_km?))
                .filter(|gap| gap.is_finite())
                .collect();

            if gaps.is_empty() || gaps.len() < self.config.min_group_samples {
                tracing::trace!(%service, direction = direction.0, gaps = gaps.len(), "Group too short to calibrate");
                continue;
            }

            contributing += 1;
            samples.extend(gaps);
        }

        (samples, contributing)
    }

    /// Compute the threshold for a route stop-sequence table.
    pub fn calibrate(&self, routes: &[RouteStop]) -> Result<(Calibration, Diagnostics), CalibrationError> {
        let cutoff = self.config.z_cutoff;
        if !cutoff.is_finite() || cutoff <= 0.0 {
            return Err(CalibrationError::InvalidCutoff(cutoff));
        }

        let mut diagnostics = Diagnostics::new();
        let (samples, groups) = self.spacing_samples(routes, &mut diagnostics);
        if groups == 0 || samples.is_empty() {
            return Err(CalibrationError::InsufficientData {
                groups,
                samples: samples.len(),
            });
        }

        let mean_km = mean(&samples);
        let std_dev_km = stddev(&samples, mean_km);

        let mut kept: Vec<f64> = if std_dev_km > 0.0 {
            samples
                .iter()
                .copied()
                .filter(|gap| ((gap - mean_km) / std_dev_km).abs() <= cutoff)
                .collect()
        } else {
            samples.clone()
        };
        let outliers_removed = samples.len() - kept.len();

        let threshold_km = median(&mut kept).ok_or(CalibrationError::InsufficientData {
            groups,
            samples: samples.len(),
        })?;
        if !threshold_km.is_finite() || threshold_km <= 0.0 {
            return Err(CalibrationError::Degenerate {
                value_km: threshold_km,
            });
        }

        let calibration = Calibration {
            threshold_km,
            threshold_m: threshold_km * 1000.0,
            groups,
            samples: samples.len(),
            outliers_removed,
            mean_km,
            std_dev_km,
        };
        tracing::debug!(
            threshold_m = calibration.threshold_m,
            groups,
            samples = calibration.samples,
            outliers_removed,
            "Calibrated stop spacing"
        );

        Ok((calibration, diagnostics))
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation given a pre-computed mean.
fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Median, averaging the middle pair for even counts. Sorts in place.
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    /// Route stops for one service from successive gaps (km).
    fn route(service: &str, direction: u8, gaps: &[f64]) -> Vec<RouteStop> {
        let mut cumulative = 0.0;
        let mut stops = vec![RouteStop::new(service, direction, 1, Some(0.0))];
        for (i, gap) in gaps.iter().enumerate() {
            cumulative += gap;
            stops.push(RouteStop::new(service, direction, i as u32 + 2, Some(cumulative)));
        }
        stops
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_mean_and_stddev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let m = mean(&values);
        assert_relative_eq!(m, 5.0);
        assert_relative_eq!(stddev(&values, m), 2.0);
        assert_eq!(stddev(&[], 0.0), 0.0);
    }

    #[test]
    fn test_short_route_median() {
        // Four gaps are too few for any z-score to pass 3.5
        let routes = route("10", 1, &[0.4, 0.41, 0.39, 5.2]);
        let (calibration, _) = DistanceCalibrator::default().calibrate(&routes).unwrap();

        assert_eq!(calibration.samples, 4);
        assert_eq!(calibration.outliers_removed, 0);
        assert_relative_eq!(calibration.threshold_m, 405.0, epsilon = 1e-6);
    }

    #[test]
    fn test_outlier_gap_is_discarded() {
        let mut gaps: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 0.39 } else { 0.41 }).collect();
        gaps.push(5.2);
        let routes = route("10", 1, &gaps);

        let (calibration, _) = DistanceCalibrator::default().calibrate(&routes).unwrap();
        assert_eq!(calibration.samples, 21);
        assert_eq!(calibration.outliers_removed, 1);
        assert_relative_eq!(calibration.threshold_m, 400.0, epsilon = 1e-6);
        assert_relative_eq!(calibration.threshold_km, 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_groups_are_kept_apart() {
        // Interleaved input rows from two directions and an unsorted sequence
        let mut routes = route("10", 1, &[0.3, 0.3, 0.3]);
        routes.extend(route("10", 2, &[0.5, 0.5, 0.5]));
        routes.reverse();

        let (calibration, _) = DistanceCalibrator::default().calibrate(&routes).unwrap();
        assert_eq!(calibration.groups, 2);
        assert_eq!(calibration.samples, 6);
        assert_relative_eq!(calibration.threshold_m, 400.0, epsilon = 1e-6);
    }

    #[test]
    fn test_short_groups_contribute_nothing() {
        let mut routes = route("shuttle", 1, &[9.0]);
        routes.extend(route("10", 1, &[0.4, 0.4]));

        let (calibration, _) = DistanceCalibrator::default().calibrate(&routes).unwrap();
        assert_eq!(calibration.groups, 1);
        assert_relative_eq!(calibration.threshold_m, 400.0, epsilon = 1e-6);
    }

    #[test]
    fn test_insufficient_data() {
        let calibrator = DistanceCalibrator::default();

        assert_eq!(
            calibrator.calibrate(&[]).unwrap_err(),
            CalibrationError::InsufficientData { groups: 0, samples: 0 }
        );

        let single_stop = vec![RouteStop::new("10", 1, 1, Some(0.0))];
        assert!(matches!(
            calibrator.calibrate(&single_stop),
            Err(CalibrationError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_degenerate_threshold() {
        let routes = route("10", 1, &[0.0, 0.0, 0.0]);
        assert_eq!(
            DistanceCalibrator::default().calibrate(&routes).unwrap_err(),
            CalibrationError::Degenerate { value_km: 0.0 }
        );
    }

    #[test]
    fn test_invalid_cutoff() {
        let calibrator = DistanceCalibrator::new(CalibratorConfig {
            z_cutoff: 0.0,
            ..CalibratorConfig::default()
        });
        let routes = route("10", 1, &[0.4, 0.4]);
        assert_eq!(calibrator.calibrate(&routes).unwrap_err(), CalibrationError::InvalidCutoff(0.0));
    }

    #[test]
    fn test_missing_distance_breaks_pairs() {
        let mut routes = route("10", 1, &[0.4, 0.4, 0.4, 0.4]);
        routes[2].distance_km = None;

        let (calibration, diagnostics) = DistanceCalibrator::default().calibrate(&routes).unwrap();
        // Gaps on either side of the missing stop are dropped
        assert_eq!(calibration.samples, 2);
        assert_eq!(diagnostics.count(WarningKind::MissingRouteDistance), 1);
    }

    proptest! {
        /// Same input, same threshold; and it lies within the observed gaps.
        #[test]
        fn calibration_is_deterministic(gaps in proptest::collection::vec(0.05f64..3.0, 2..40)) {
            let routes = route("10", 1, &gaps);
            let calibrator = DistanceCalibrator::default();

            let (first, _) = calibrator.calibrate(&routes).unwrap();
            let (second, _) = calibrator.calibrate(&routes).unwrap();
            prop_assert_eq!(first.threshold_m.to_bits(), second.threshold_m.to_bits());

            let min = gaps.iter().copied().fold(f64::INFINITY, f64::min);
            let max = gaps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(first.threshold_km >= min - 1e-9 && first.threshold_km <= max + 1e-9);
        }
    }
}
