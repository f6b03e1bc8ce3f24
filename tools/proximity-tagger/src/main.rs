use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use transit_proximity::{
    Crs, Datasets, DedupPolicy, PipelineConfig, PipelineOrchestrator, SourceCrs, StationLineColumns,
    TableColumns,
};

mod load;
mod output;

use load::read_table;
use output::{write_report, write_tagged_csv};

#[derive(Parser, Debug)]
#[command(
    name = "proximity-tagger",
    author,
    version,
    about = "Tag bus stops within walking distance of rail station exits",
    long_about = "Resolves rail exit labels to reference stations, calibrates a walking \
                  threshold from bus stop spacing, and tags every bus stop whose nearest \
                  rail exit lies within that threshold.\n\n\
                  Writes the tagged bus stop table as CSV and, optionally, a JSON report \
                  with the threshold, reference systems, and skipped-record counts."
)]
struct Args {
    /// Bus stop CSV (BusStopCode, RoadName, Description, Latitude, Longitude)
    #[arg(long)]
    bus_stops: PathBuf,

    /// Bus route CSV (ServiceNo, Direction, StopSequence, BusStopCode, Distance)
    #[arg(long)]
    bus_routes: PathBuf,

    /// Rail exit CSV (EXIT_CODE, STATION_NA, Latitude, Longitude)
    #[arg(long)]
    rail_exits: PathBuf,

    /// Station line reference CSV (station_name plus one flag column per line)
    #[arg(long)]
    station_lines: PathBuf,

    /// Read station lines from this code-string column (e.g. "NS24 NE6 CC1") instead of flag columns
    #[arg(long)]
    line_codes_column: Option<String>,

    /// Output CSV for tagged bus stops
    #[arg(short, long)]
    output: PathBuf,

    /// Also write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Minimum fuzzy score (0-100) for a station name match
    #[arg(long, default_value_t = 50.0)]
    min_score: f64,

    /// z-score cutoff for spacing outliers
    #[arg(long, default_value_t = 3.5)]
    z_cutoff: f64,

    /// Keep light-rail exits instead of dropping them
    #[arg(long)]
    keep_light_rail: bool,

    /// Resolve stops shared by several exits to the first exit rather than the closest
    #[arg(long)]
    first_seen: bool,

    /// Fixed walking threshold in metres (skips calibration)
    #[arg(long)]
    threshold_m: Option<f64>,

    /// Reference system of bus stop coordinates (e.g. EPSG:4326, svy21)
    #[arg(long)]
    bus_stop_crs: Option<Crs>,

    /// Reference system of rail exit coordinates
    #[arg(long)]
    exit_crs: Option<Crs>,

    /// Planar reference system distances are measured in
    #[arg(long, default_value = "EPSG:3414")]
    target_crs: Crs,

    /// Verbose output (show debug messages)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        if !(0.0..=100.0).contains(&self.min_score) {
            bail!("--min-score must be between 0 and 100, got {}", self.min_score);
        }
        if !self.target_crs.is_planar() {
            bail!("--target-crs must be a planar system, got {}", self.target_crs);
        }

        let mut config = PipelineConfig::default();
        config.resolver.min_score = self.min_score;
        config.resolver.exclude_light_rail = !self.keep_light_rail;
        config.calibrator.z_cutoff = self.z_cutoff;
        config.tagger.target_crs = self.target_crs;
        if self.first_seen {
            config.tagger.dedup = DedupPolicy::FirstSeen;
        }
        config.threshold_override = self.threshold_m;
        Ok(config)
    }

    fn table_columns(&self) -> TableColumns {
        TableColumns {
            station_lines: StationLineColumns {
                code_string: self.line_codes_column.clone(),
                ..StationLineColumns::default()
            },
            ..TableColumns::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    log::info!("=== Bus Stop Proximity Tagger ===");
    log::info!("Output: {}", args.output.display());

    let config = args.pipeline_config()?;

    for path in [&args.bus_stops, &args.bus_routes, &args.rail_exits, &args.station_lines] {
        if !path.exists() {
            bail!("Input file does not exist: {}", path.display());
        }
    }

    // Phase 1: Load tables
    log::info!("");
    log::info!("Phase 1: Loading input tables...");
    let bus_stops = read_table(&args.bus_stops, "bus_stops")?;
    let bus_routes = read_table(&args.bus_routes, "bus_routes")?;
    let rail_exits = read_table(&args.rail_exits, "rail_exits")?;
    let station_lines = read_table(&args.station_lines, "station_lines")?;

    let datasets = Datasets::from_tables(
        &bus_stops,
        &bus_routes,
        &rail_exits,
        &station_lines,
        &args.table_columns(),
    )
    .context("Input tables do not have the expected shape")?
    .with_crs(SourceCrs {
        bus_stops: args.bus_stop_crs,
        rail_exits: args.exit_crs,
    });
    log::info!(
        "  {} bus stops, {} route stops, {} rail exits, {} reference stations",
        datasets.bus_stops.len(),
        datasets.bus_routes.len(),
        datasets.rail_exits.len(),
        datasets.station_lines.len()
    );

    // Phase 2: Resolve, calibrate, and tag
    log::info!("");
    log::info!("Phase 2: Tagging bus stops...");
    let run = PipelineOrchestrator::new(config)
        .run(&datasets)
        .context("Proximity tagging failed")?;

    let report = &run.report;
    match &report.calibration {
        Some(calibration) => log::info!(
            "  Calibrated threshold: {:.1} m ({} gaps, {} outliers removed)",
            report.threshold_m,
            calibration.samples,
            calibration.outliers_removed
        ),
        None => log::info!("  Supplied threshold: {:.1} m", report.threshold_m),
    }
    if report.bus_stop_crs_assumed {
        log::warn!("  Bus stop reference system not given, assumed {}", report.bus_stop_crs);
    }
    if report.rail_exit_crs_assumed {
        log::warn!("  Rail exit reference system not given, assumed {}", report.rail_exit_crs);
    }

    // Phase 3: Write output
    log::info!("");
    log::info!("Phase 3: Writing output...");
    write_tagged_csv(&run.rows, &args.output).context("Failed to write tagged bus stops")?;
    if let Some(report_path) = &args.report {
        write_report(report, &run.line_summary(), report_path).context("Failed to write run report")?;
    }

    // Summary
    log::info!("");
    log::info!("=== Summary ===");
    log::info!("  Bus stops:        {}", report.bus_stops);
    log::info!("  Rail adjacent:    {}", report.adjacent_stops);
    log::info!("  Matched exits:    {}/{}", report.matched_exits, report.rail_exits);
    for (kind, count) in &report.warning_counts {
        log::info!("  Skipped ({kind}): {count}");
    }
    for (line, count) in run.line_summary().iter().filter(|(_, count)| *count > 0) {
        log::info!("  {line}: {count} adjacent stops");
    }
    log::info!("");
    log::info!("Done!");

    Ok(())
}
