use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use strum::IntoEnumIterator;
use transit_proximity::{LineCode, LineSummary, RunReport, TaggedBusStop};

/// Header of the tagged bus-stop CSV.
pub fn header() -> Vec<String> {
    let mut header: Vec<String> = [
        "stop_code",
        "road_name",
        "description",
        "x",
        "y",
        "is_rail_adjacent",
        "matched_station_name",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(LineCode::iter().map(LineCode::column_name));
    header.push("distance_to_nearest_exit".to_string());
    header.push("nearest_exit".to_string());
    header
}

/// One CSV record for a tagged stop. Missing values are written as empty cells.
pub fn render_row(row: &TaggedBusStop) -> Vec<String> {
    let stop = &row.stop;
    let (x, y) = match stop.location {
        Some(point) => (point.x().to_string(), point.y().to_string()),
        None => (String::new(), String::new()),
    };

    let mut record = vec![
        stop.code.to_string(),
        stop.road_name.clone().unwrap_or_default(),
        stop.description.clone().unwrap_or_default(),
        x,
        y,
        row.is_rail_adjacent.to_string(),
        row.matched_station_name
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_default(),
    ];
    record.extend(row.lines.to_bools().iter().map(|flag| flag.to_string()));
    record.push(
        row.distance_to_nearest_exit
            .map(|d| format!("{d:.2}"))
            .unwrap_or_default(),
    );
    record.push(
        row.nearest_exit
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default(),
    );
    record
}

/// Write tagged rows to a CSV file, in input order.
pub fn write_tagged_csv(rows: &[TaggedBusStop], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(header())?;
    for row in rows {
        writer.write_record(render_row(row))?;
    }
    writer.flush()?;

    log::info!("  Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[derive(Serialize)]
struct ReportFile<'a> {
    #[serde(flatten)]
    run: &'a RunReport,
    adjacent_stops_per_line: BTreeMap<&'static str, usize>,
}

/// Write the run report, with the per-line summary, as pretty JSON.
pub fn write_report(report: &RunReport, summary: &LineSummary, path: &Path) -> Result<()> {
    let file = ReportFile {
        run: report,
        adjacent_stops_per_line: summary
            .iter()
            .map(|(line, count)| (line.into(), count))
            .collect(),
    };

    let json = serde_json::to_string_pretty(&file).context("Failed to serialize run report")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!("  Wrote run report to {}", path.display());
    Ok(())
}
