//! Column-oriented input tables and typed ingestion.
//!
//! Callers hand the pipeline plain string tables (one vector per column over
//! a shared row axis). This module is the only place that checks column
//! presence and value types; everything downstream works on typed records.
//!
//! Blank cells are treated as nulls. Unparseable coordinates become `None`
//! locations rather than errors, since the tagger excludes such records
//! individually.

use geo::Point;

use crate::error::DataShapeError;
use crate::identifiers::{ExitIdentifier, StopCode};
use crate::models::lines::{LineCode, LineFlags, StationLineRecord};
use crate::models::types::{BusStop, Direction, RailExit, RouteStop};

use strum::IntoEnumIterator;

/// A named table of string cells.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<(String, Vec<String>)>,
    rows: usize,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: 0,
        }
    }

    /// Build a table from a header row and record rows, as read from a CSV.
    pub fn from_rows(
        name: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<Self, DataShapeError> {
        let mut table = Self::new(name);
        let mut columns: Vec<Vec<String>> = vec![Vec::with_capacity(rows.len()); headers.len()];

        for (row_index, row) in rows.into_iter().enumerate() {
            if row.len() != headers.len() {
                return Err(DataShapeError::InvalidValue {
                    table: table.name.clone(),
                    column: "<row>".to_string(),
                    row: row_index,
                    value: format!("{} fields, expected {}", row.len(), headers.len()),
                });
            }
            for (column, cell) in columns.iter_mut().zip(row) {
                column.push(cell);
            }
        }

        for (header, values) in headers.into_iter().zip(columns) {
            table.push_column(header, values)?;
        }
        Ok(table)
    }

    /// Builder-style column insertion for literal tables.
    ///
    /// # Panics
    ///
    /// Panics if the column length differs from existing columns.
    pub fn with_column<S: Into<String>>(mut self, name: &str, values: Vec<S>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        if let Err(e) = self.push_column(name, values) {
            panic!("{e}");
        }
        self
    }

    /// Append a column, checking it spans the same rows as the others.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<String>,
    ) -> Result<(), DataShapeError> {
        let name = name.into();
        if !self.columns.is_empty() && values.len() != self.rows {
            return Err(DataShapeError::RaggedColumn {
                table: self.name.clone(),
                column: name,
                expected: self.rows,
                found: values.len(),
            });
        }
        self.rows = values.len();
        self.columns.push((name, values));
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.optional_column(name).is_some()
    }

    /// A required column.
    pub fn column(&self, name: &str) -> Result<&[String], DataShapeError> {
        self.optional_column(name)
            .ok_or_else(|| DataShapeError::MissingColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    pub fn optional_column(&self, name: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, values)| values.as_slice())
    }

    fn invalid(&self, column: &str, row: usize, value: &str) -> DataShapeError {
        DataShapeError::InvalidValue {
            table: self.name.clone(),
            column: column.to_string(),
            row,
            value: value.to_string(),
        }
    }

    /// Parse a required column cell by cell; blanks are errors.
    fn parse_column<T: std::str::FromStr>(&self, name: &str) -> Result<Vec<T>, DataShapeError> {
        self.column(name)?
            .iter()
            .enumerate()
            .map(|(row, cell)| cell.trim().parse().map_err(|_| self.invalid(name, row, cell)))
            .collect()
    }

    /// Parse a nullable numeric column; blanks become `None`, garbage is an error.
    fn parse_nullable_f64(&self, name: &str) -> Result<Vec<Option<f64>>, DataShapeError> {
        self.column(name)?
            .iter()
            .enumerate()
            .map(|(row, cell)| match non_blank(cell) {
                None => Ok(None),
                Some(s) => s.parse().map(Some).map_err(|_| self.invalid(name, row, cell)),
            })
            .collect()
    }

    /// Read a coordinate pair; any missing or unparseable value yields `None`.
    fn points(&self, x: &str, y: &str) -> Result<Vec<Option<Point>>, DataShapeError> {
        let xs = self.column(x)?;
        let ys = self.column(y)?;
        Ok(xs
            .iter()
            .zip(ys)
            .map(|(x, y)| {
                let x: f64 = non_blank(x)?.parse().ok()?;
                let y: f64 = non_blank(y)?.parse().ok()?;
                Some(Point::new(x, y))
            })
            .collect())
    }
}

fn non_blank(cell: &str) -> Option<&str> {
    let trimmed = cell.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn optional_cells(column: Option<&[String]>, row: usize) -> Option<String> {
    column
        .and_then(|values| non_blank(&values[row]))
        .map(str::to_string)
}

fn parse_flag(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "n" => Some(false),
        "1" | "true" | "yes" | "y" => Some(true),
        _ => None,
    }
}

// ============================================================================
// Column layouts
// ============================================================================

/// Column names of the bus-stop table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusStopColumns {
    pub code: String,
    pub road_name: Option<String>,
    pub description: Option<String>,
    /// Longitude or easting.
    pub x: String,
    /// Latitude or northing.
    pub y: String,
}

impl Default for BusStopColumns {
    fn default() -> Self {
        Self {
            code: "BusStopCode".into(),
            road_name: Some("RoadName".into()),
            description: Some("Description".into()),
            x: "Longitude".into(),
            y: "Latitude".into(),
        }
    }
}

/// Column names of the route stop-sequence table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteColumns {
    pub service: String,
    pub direction: String,
    pub stop_sequence: String,
    pub stop_code: Option<String>,
    /// Cumulative distance in kilometres.
    pub distance_km: String,
}

impl Default for RouteColumns {
    fn default() -> Self {
        Self {
            service: "ServiceNo".into(),
            direction: "Direction".into(),
            stop_sequence: "StopSequence".into(),
            stop_code: Some("BusStopCode".into()),
            distance_km: "Distance".into(),
        }
    }
}

/// Column names of the rail-exit table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RailExitColumns {
    /// Exit identifier; the row number is used when absent or blank.
    pub id: Option<String>,
    pub label: String,
    pub x: String,
    pub y: String,
}

impl Default for RailExitColumns {
    fn default() -> Self {
        Self {
            id: Some("EXIT_CODE".into()),
            label: "STATION_NA".into(),
            x: "Longitude".into(),
            y: "Latitude".into(),
        }
    }
}

/// Column names of the station-line reference table.
///
/// Either one boolean column per line code (`{flag_prefix}NS`, ...) or a
/// single code-string column such as `"NS24 NE6 CC1"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StationLineColumns {
    pub name: String,
    pub flag_prefix: String,
    /// Used instead of flag columns when set and present in the table.
    pub code_string: Option<String>,
    /// Leading line codes whose rows are dropped in code-string mode.
    pub excluded_prefixes: Vec<String>,
}

impl Default for StationLineColumns {
    fn default() -> Self {
        Self {
            name: "station_name".into(),
            flag_prefix: String::new(),
            code_string: None,
            excluded_prefixes: crate::models::lines::EXCLUDED_LINE_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ============================================================================
// Ingestion
// ============================================================================

pub fn bus_stops(table: &Table, columns: &BusStopColumns) -> Result<Vec<BusStop>, DataShapeError> {
    let codes = table.column(&columns.code)?;
    let points = table.points(&columns.x, &columns.y)?;
    let road_names = columns.road_name.as_deref().and_then(|c| table.optional_column(c));
    let descriptions = columns.description.as_deref().and_then(|c| table.optional_column(c));

    codes
        .iter()
        .zip(points)
        .enumerate()
        .map(|(row, (code, location))| -> Result<BusStop, DataShapeError> {
            let code = non_blank(code).ok_or_else(|| table.invalid(&columns.code, row, code))?;
            Ok(BusStop {
                code: StopCode::new(code),
                road_name: optional_cells(road_names, row),
                description: optional_cells(descriptions, row),
                location,
            })
        })
        .collect()
}

pub fn route_stops(table: &Table, columns: &RouteColumns) -> Result<Vec<RouteStop>, DataShapeError> {
    let services = table.column(&columns.service)?;
    let directions: Vec<u8> = table.parse_column(&columns.direction)?;
    let sequences: Vec<u32> = table.parse_column(&columns.stop_sequence)?;
    let distances = table.parse_nullable_f64(&columns.distance_km)?;
    let stop_codes = columns.stop_code.as_deref().and_then(|c| table.optional_column(c));

    services
        .iter()
        .zip(directions)
        .zip(sequences)
        .zip(distances)
        .enumerate()
        .map(|(row, (((service, direction), stop_sequence), distance_km))| -> Result<RouteStop, DataShapeError> {
            let service =
                non_blank(service).ok_or_else(|| table.invalid(&columns.service, row, service))?;
            Ok(RouteStop {
                service: service.into(),
                direction: Direction(direction),
                stop_sequence,
                stop_code: optional_cells(stop_codes, row).map(StopCode::from),
                distance_km,
            })
        })
        .collect()
}

pub fn rail_exits(table: &Table, columns: &RailExitColumns) -> Result<Vec<RailExit>, DataShapeError> {
    let labels = table.column(&columns.label)?;
    let points = table.points(&columns.x, &columns.y)?;
    let ids = columns.id.as_deref().and_then(|c| table.optional_column(c));

    Ok(labels
        .iter()
        .zip(points)
        .enumerate()
        .map(|(row, (label, location))| RailExit {
            id: optional_cells(ids, row)
                .map(ExitIdentifier::from)
                .unwrap_or_else(|| ExitIdentifier::new(format!("row-{row}"))),
            station_label: non_blank(label).map(str::to_string),
            location,
        })
        .collect())
}

pub fn station_lines(
    table: &Table,
    columns: &StationLineColumns,
) -> Result<Vec<StationLineRecord>, DataShapeError> {
    let names = table.column(&columns.name)?;

    if let Some(codes) = columns.code_string.as_deref().and_then(|c| table.optional_column(c)) {
        let excluded: Vec<&str> = columns.excluded_prefixes.iter().map(String::as_str).collect();
        let rows = names.iter().map(String::as_str).zip(codes.iter().map(String::as_str));
        return Ok(StationLineRecord::from_reference_rows(rows, &excluded));
    }

    let mut flags = vec![LineFlags::new(); table.len()];
    for line in LineCode::iter() {
        let column = format!("{}{}", columns.flag_prefix, line);
        for (row, cell) in table.column(&column)?.iter().enumerate() {
            match parse_flag(cell) {
                Some(true) => flags[row].set(line),
                Some(false) => {}
                None => return Err(table.invalid(&column, row, cell)),
            }
        }
    }

    Ok(names
        .iter()
        .zip(flags)
        .filter_map(|(name, lines)| non_blank(name).map(|name| StationLineRecord::new(name, lines)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops_table() -> Table {
        Table::new("bus_stops")
            .with_column("BusStopCode", vec!["01012", "01013", "01019"])
            .with_column("RoadName", vec!["Victoria St", "", "Victoria St"])
            .with_column("Description", vec!["Hotel Grand Pacific", "St. Joseph's Ch", "Bras Basah Cplx"])
            .with_column("Latitude", vec!["1.29685", "1.29771", "n/a"])
            .with_column("Longitude", vec!["103.85254", "103.85343", "103.85367"])
    }

    #[test]
    fn test_bus_stops_ingestion() {
        let stops = bus_stops(&stops_table(), &BusStopColumns::default()).unwrap();

        assert_eq!(stops.len(), 3);
        assert_eq!(stops[0].code.as_str(), "01012");
        assert_eq!(stops[0].location, Some(Point::new(103.85254, 1.29685)));
        assert_eq!(stops[1].road_name, None);
        assert_eq!(stops[2].description.as_deref(), Some("Bras Basah Cplx"));
        // Unparseable coordinates are kept as a missing location
        assert_eq!(stops[2].location, None);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let table = Table::new("bus_stops").with_column("BusStopCode", vec!["01012"]);
        let err = bus_stops(&table, &BusStopColumns::default()).unwrap_err();

        assert_eq!(
            err,
            DataShapeError::MissingColumn {
                table: "bus_stops".into(),
                column: "Longitude".into(),
            }
        );
    }

    #[test]
    fn test_ragged_column_rejected() {
        let mut table = Table::new("t").with_column("a", vec!["1", "2"]);
        let err = table.push_column("b", vec!["1".to_string()]).unwrap_err();
        assert!(matches!(err, DataShapeError::RaggedColumn { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_from_rows() {
        let table = Table::from_rows(
            "rail_exits",
            vec!["STATION_NA".into(), "Latitude".into()],
            vec![
                vec!["BUGIS MRT STATION".into(), "1.30".into()],
                vec!["BUGIS MRT STATION".into(), "1.31".into()],
            ],
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.has_column("Latitude"));
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["STATION_NA", "Latitude"]);

        let err = Table::from_rows("t", vec!["a".into()], vec![vec![]]).unwrap_err();
        assert!(matches!(err, DataShapeError::InvalidValue { row: 0, .. }));
    }

    #[test]
    fn test_route_stops_ingestion() {
        let table = Table::new("bus_routes")
            .with_column("ServiceNo", vec!["10", "10", "10"])
            .with_column("Direction", vec!["1", "1", "1"])
            .with_column("StopSequence", vec!["1", "2", "3"])
            .with_column("BusStopCode", vec!["75009", "76059", "76069"])
            .with_column("Distance", vec!["0", "0.6", ""]);

        let routes = route_stops(&table, &RouteColumns::default()).unwrap();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[1].distance_km, Some(0.6));
        assert_eq!(routes[2].distance_km, None);
        assert_eq!(routes[0].stop_code, Some(StopCode::new("75009")));
        assert_eq!(routes[0].direction, Direction(1));
    }

    #[test]
    fn test_route_stops_invalid_sequence() {
        let table = Table::new("bus_routes")
            .with_column("ServiceNo", vec!["10"])
            .with_column("Direction", vec!["1"])
            .with_column("StopSequence", vec!["first"])
            .with_column("Distance", vec!["0"]);

        let err = route_stops(&table, &RouteColumns::default()).unwrap_err();
        assert_eq!(
            err,
            DataShapeError::InvalidValue {
                table: "bus_routes".into(),
                column: "StopSequence".into(),
                row: 0,
                value: "first".into(),
            }
        );
    }

    #[test]
    fn test_rail_exits_ingestion() {
        let table = Table::new("rail_exits")
            .with_column("STATION_NA", vec!["BUGIS MRT STATION", " "])
            .with_column("EXIT_CODE", vec!["Exit A", ""])
            .with_column("Longitude", vec!["103.8559", "103.8560"])
            .with_column("Latitude", vec!["1.3009", "1.3010"]);

        let exits = rail_exits(&table, &RailExitColumns::default()).unwrap();
        assert_eq!(exits[0].id.as_str(), "Exit A");
        assert_eq!(exits[0].station_label.as_deref(), Some("BUGIS MRT STATION"));
        assert_eq!(exits[1].id.as_str(), "row-1");
        assert_eq!(exits[1].station_label, None);
    }

    #[test]
    fn test_station_lines_from_flag_columns() {
        let mut table = Table::new("station_lines")
            .with_column("station_name", vec!["Bugis", "Jurong East"]);
        for line in LineCode::iter() {
            let values = match line {
                LineCode::EW => vec!["1", "1"],
                LineCode::DT => vec!["1", "0"],
                LineCode::NS => vec!["0", "1"],
                _ => vec!["0", ""],
            };
            table = table.with_column(&line.to_string(), values);
        }

        let records = station_lines(&table, &StationLineColumns::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name.as_str(), "bugis");
        assert!(records[0].lines.contains(LineCode::DT));
        assert!(!records[0].lines.contains(LineCode::NS));
        assert!(records[1].lines.contains(LineCode::NS));
    }

    #[test]
    fn test_station_lines_missing_flag_column() {
        let table = Table::new("station_lines")
            .with_column("station_name", vec!["Bugis"])
            .with_column("NS", vec!["0"]);

        let err = station_lines(&table, &StationLineColumns::default()).unwrap_err();
        assert!(matches!(err, DataShapeError::MissingColumn { ref column, .. } if column == "EW"));
    }

    #[test]
    fn test_station_lines_from_code_string() {
        let table = Table::new("station_lines")
            .with_column("Station name", vec!["Bugis", "Circle Line (CCL)", "Punggol Coast"])
            .with_column("Code", vec!["EW12 DT14", "CC", "CP4"]);

        let columns = StationLineColumns {
            name: "Station name".into(),
            code_string: Some("Code".into()),
            ..StationLineColumns::default()
        };
        let records = station_lines(&table, &columns).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name.as_str(), "bugis");
        assert!(records[0].lines.contains(LineCode::EW));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
