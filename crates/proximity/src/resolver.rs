//! Resolve free-text rail exit labels to canonical station names.
//!
//! Matching is token-order insensitive: both strings are lower-cased, split
//! into alphanumeric tokens, sorted, and rejoined before an edit-distance
//! similarity is taken. Each label goes to the single best-scoring
//! canonical name, or to nothing when no candidate reaches the minimum score.

use crate::error::{Diagnostics, WarningKind};
use crate::models::lines::StationLineRecord;
use crate::models::types::{MatchedExit, RailExit};

const DATASET: &str = "rail_exits";

/// Tuning for station name resolution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolverConfig {
    /// Scores below this (0-100) resolve to no match.
    pub min_score: f64,

    /// Drop exits whose label contains a light-rail marker.
    pub exclude_light_rail: bool,

    /// Case-insensitive substrings that mark a light-rail exit.
    pub light_rail_markers: Vec<String>,

    /// Tokens removed from exit labels before matching.
    pub strip_tokens: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_score: 50.0,
            exclude_light_rail: true,
            light_rail_markers: vec!["lrt".into()],
            strip_tokens: vec!["station".into()],
        }
    }
}

/// Best candidate for a label.
#[derive(Debug, Clone, PartialEq)]
pub struct StationMatch {
    /// Row in the reference table.
    pub index: usize,
    pub score: f64,
}

/// Output of resolving a batch of exits.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// One entry per exit that survived preprocessing, in input order.
    pub exits: Vec<MatchedExit>,
    pub diagnostics: Diagnostics,
}

impl Resolution {
    pub fn matched_count(&self) -> usize {
        self.exits.iter().filter(|e| e.is_matched()).count()
    }
}

/// Fuzzy matcher over a fixed set of canonical stations.
pub struct StationNameResolver<'a> {
    stations: &'a [StationLineRecord],
    keys: Vec<String>,
    config: ResolverConfig,
}

impl<'a> StationNameResolver<'a> {
    pub fn new(stations: &'a [StationLineRecord], config: ResolverConfig) -> Self {
        let keys = stations
            .iter()
            .map(|s| sorted_tokens(s.name.as_str(), &[]))
            .collect();
        Self {
            stations,
            keys,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Whether `label` carries a light-rail marker.
    pub fn is_light_rail(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.config
            .light_rail_markers
            .iter()
            .any(|marker| !marker.is_empty() && label.contains(&marker.to_lowercase()))
    }

    /// Normalised matching key for a raw exit label.
    pub fn clean_label(&self, label: &str) -> String {
        sorted_tokens(label, &self.config.strip_tokens)
    }

    /// Highest-scoring canonical station for a raw label, ignoring the
    /// minimum score. Ties go to the earliest reference row.
    pub fn best_match(&self, label: &str) -> Option<StationMatch> {
        let key = self.clean_label(label);
        self.best_match_key(&key)
    }

    fn best_match_key(&self, key: &str) -> Option<StationMatch> {
        let mut best: Option<StationMatch> = None;
        for (index, candidate) in self.keys.iter().enumerate() {
            let score = similarity(key, candidate);
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(StationMatch { index, score });
            }
        }
        best
    }

    /// Resolve one exit.
    ///
    /// Returns `None` when the exit is excluded before matching (light rail,
    /// or an empty label), recording why in `diagnostics`.
    pub fn resolve_exit(&self, exit: &RailExit, diagnostics: &mut Diagnostics) -> Option<MatchedExit> {
        let Some(label) = exit.station_label.as_deref().filter(|l| !l.trim().is_empty()) else {
            diagnostics.warn(WarningKind::EmptyLabel, DATASET, &exit.id, "no station label");
            return None;
        };

        if self.config.exclude_light_rail && self.is_light_rail(label) {
            diagnostics.warn(WarningKind::LightRailExcluded, DATASET, &exit.id, label);
            return None;
        }

        let key = self.clean_label(label);
        if key.is_empty() {
            diagnostics.warn(
                WarningKind::EmptyLabel,
                DATASET,
                &exit.id,
                format!("label {label:?} has no tokens after cleaning"),
            );
            return None;
        }

        match self.best_match_key(&key) {
            Some(m) if m.score >= self.config.min_score => {
                let station = &self.stations[m.index];
                tracing::trace!(exit = %exit.id, label, station = %station.name, score = m.score, "Resolved exit");
                Some(MatchedExit {
                    exit: exit.clone(),
                    station: Some(station.name.clone()),
                    score: Some(m.score),
                    lines: station.lines,
                })
            }
            best => {
                let score = best.map(|m| m.score);
                diagnostics.warn(
                    WarningKind::UnmatchedLabel,
                    DATASET,
                    &exit.id,
                    match score {
                        Some(score) => format!("{label:?} best score {score:.1}"),
                        None => format!("{label:?} has no candidate stations"),
                    },
                );
                Some(MatchedExit::unmatched(exit.clone(), score))
            }
        }
    }

    /// Resolve every exit, keeping input order.
    pub fn resolve(&self, exits: &[RailExit]) -> Resolution {
        let mut diagnostics = Diagnostics::new();
        let exits: Vec<MatchedExit> = exits
            .iter()
            .filter_map(|exit| self.resolve_exit(exit, &mut diagnostics))
            .collect();

        let resolution = Resolution { exits, diagnostics };
        tracing::debug!(
            resolved = resolution.exits.len(),
            matched = resolution.matched_count(),
            skipped = resolution.diagnostics.len(),
            "Resolved rail exit labels"
        );
        resolution
    }
}

/// Lower-case, tokenize on non-alphanumerics, drop `strip` tokens, sort, rejoin.
fn sorted_tokens(s: &str, strip: &[String]) -> String {
    let lowered = s.to_lowercase();
    let mut tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter(|t| !strip.iter().any(|s| s.eq_ignore_ascii_case(t)))
        .collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Token-sort similarity of two strings on a 0-100 scale.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    similarity(&sorted_tokens(a, &[]), &sorted_tokens(b, &[]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::lines::{LineCode, LineFlags};
    use proptest::prelude::*;

    fn stations() -> Vec<StationLineRecord> {
        vec![
            StationLineRecord::from_code_string("Jurong East", "NS1 EW24"),
            StationLineRecord::from_code_string("Bugis", "EW12 DT14"),
        ]
    }

    fn exit(id: &str, label: &str) -> RailExit {
        RailExit::new(id, label, None)
    }

    #[test]
    fn test_token_sort_ratio() {
        assert_eq!(token_sort_ratio("east jurong", "Jurong East"), 100.0);
        assert_eq!(token_sort_ratio("abc", "xyz"), 0.0);
        assert!(token_sort_ratio("bugis mrt", "bugis") > 50.0);
    }

    #[test]
    fn test_clean_label() {
        let stations = stations();
        let resolver = StationNameResolver::new(&stations, ResolverConfig::default());

        assert_eq!(resolver.clean_label("BUGIS MRT STATION"), "bugis mrt");
        assert_eq!(resolver.clean_label("  Jurong East  MRT Station"), "east jurong mrt");
    }

    #[test]
    fn test_bugis_resolves() {
        let stations = stations();
        let resolver = StationNameResolver::new(&stations, ResolverConfig::default());

        let resolution = resolver.resolve(&[exit("A", "Bugis MRT Station")]);
        assert_eq!(resolution.exits.len(), 1);

        let matched = &resolution.exits[0];
        assert_eq!(matched.station.as_ref().unwrap().as_str(), "bugis");
        assert!(matched.score.unwrap() >= 50.0);
        assert!(matched.lines.contains(LineCode::DT));
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn test_light_rail_excluded_before_matching() {
        let stations = stations();
        let resolver = StationNameResolver::new(&stations, ResolverConfig::default());

        let resolution = resolver.resolve(&[exit("A", "Jurong East LRT"), exit("B", "BUKIT PANJANG lrt STATION")]);
        assert!(resolution.exits.is_empty());
        assert_eq!(resolution.diagnostics.count(WarningKind::LightRailExcluded), 2);
    }

    #[test]
    fn test_light_rail_exclusion_is_configurable() {
        let stations = stations();
        let config = ResolverConfig {
            exclude_light_rail: false,
            ..ResolverConfig::default()
        };
        let resolver = StationNameResolver::new(&stations, config);

        let resolution = resolver.resolve(&[exit("A", "Jurong East LRT")]);
        assert_eq!(resolution.exits.len(), 1);
        assert_eq!(resolution.exits[0].station.as_ref().unwrap().as_str(), "jurong east");
    }

    #[test]
    fn test_unmatched_exit_is_kept() {
        let stations = stations();
        let resolver = StationNameResolver::new(&stations, ResolverConfig::default());

        let resolution = resolver.resolve(&[exit("Z", "Woodlands North MRT Station")]);
        assert_eq!(resolution.exits.len(), 1);

        let unmatched = &resolution.exits[0];
        assert!(!unmatched.is_matched());
        assert_eq!(unmatched.lines, LineFlags::default());
        assert!(unmatched.score.unwrap() < 50.0);
        assert_eq!(resolution.diagnostics.count(WarningKind::UnmatchedLabel), 1);
    }

    #[test]
    fn test_empty_reference_set() {
        let resolver = StationNameResolver::new(&[], ResolverConfig::default());

        let resolution = resolver.resolve(&[exit("A", "Bugis MRT Station")]);
        assert_eq!(resolution.exits.len(), 1);
        assert!(!resolution.exits[0].is_matched());
        assert_eq!(resolution.exits[0].score, None);
    }

    #[test]
    fn test_empty_labels_excluded() {
        let stations = stations();
        let resolver = StationNameResolver::new(&stations, ResolverConfig::default());

        let blank = RailExit {
            station_label: None,
            ..exit("B", "")
        };
        let resolution = resolver.resolve(&[exit("A", "   "), blank, exit("C", "STATION")]);
        assert!(resolution.exits.is_empty());
        assert_eq!(resolution.diagnostics.count(WarningKind::EmptyLabel), 3);
    }

    #[test]
    fn test_ties_go_to_first_reference_row() {
        let stations = vec![
            StationLineRecord::from_code_string("Alpha", "NS1"),
            StationLineRecord::from_code_string("alpha", "EW1"),
        ];
        let resolver = StationNameResolver::new(&stations, ResolverConfig::default());

        let best = resolver.best_match("ALPHA MRT STATION").unwrap();
        assert_eq!(best.index, 0);
    }

    #[test]
    fn test_min_score_is_configurable() {
        let stations = stations();
        let config = ResolverConfig {
            min_score: 90.0,
            ..ResolverConfig::default()
        };
        let resolver = StationNameResolver::new(&stations, config);

        let resolution = resolver.resolve(&[exit("A", "Bugis MRT Station")]);
        assert!(!resolution.exits[0].is_matched());
    }

    proptest! {
        /// Reordering the tokens of a label never changes its match.
        #[test]
        fn reordering_tokens_keeps_match(
            words in proptest::collection::vec("[a-z]{2,8}", 1..4),
            rotate in 0usize..4,
        ) {
            let stations = stations();
            let resolver = StationNameResolver::new(&stations, ResolverConfig::default());

            let mut forward = words.clone();
            forward.push("MRT".to_string());
            forward.push("Station".to_string());
            let mut reordered = forward.clone();
            let len = reordered.len();
            reordered.rotate_left(rotate % len);

            let a = resolver.best_match(&forward.join(" "));
            let b = resolver.best_match(&reordered.join(" "));
            prop_assert_eq!(a, b);
        }

        /// Scores stay within 0-100.
        #[test]
        fn score_is_bounded(a in "[a-zA-Z ]{0,20}", b in "[a-zA-Z ]{0,20}") {
            let score = token_sort_ratio(&a, &b);
            prop_assert!((0.0..=100.0).contains(&score));
        }
    }

    #[test]
    fn test_station_name_mrt_ordering() {
        let stations = vec![StationLineRecord::from_code_string("Name", "CC1")];
        let resolver = StationNameResolver::new(&stations, ResolverConfig::default());

        let a = resolver.best_match("Station Name MRT").unwrap();
        let b = resolver.best_match("Name MRT Station").unwrap();
        assert_eq!(a, b);
    }
}
