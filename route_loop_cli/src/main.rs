use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use rayon::prelude::*;
use route_loop::{
    compute_splits, summarize, Route, Segment, SeriesKey, SeriesSource, SplitMode, SplitParams,
    SplitSummary, DEFAULT_INTERVAL,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Split reports for recorded routes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute split tables for one or more route CSV files
    Splits(SplitsArgs),
    /// Report point counts and available series per route CSV file
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct SplitsArgs {
    /// Route CSV files (header row names the series: distance,time,elevation,lat,lng,...)
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "splits.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Optional JSON report with per-file summaries
    #[arg(long, value_hint = ValueHint::FilePath)]
    json: Option<PathBuf>,

    /// JSON file with split parameters; flags below override it
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Series to split on
    #[arg(long)]
    series: Option<SeriesKey>,

    /// Split every INTERVAL units of the split series
    #[arg(long, conflicts_with = "points")]
    interval: Option<f64>,

    /// Split every N recorded points instead of by interval
    #[arg(long)]
    points: Option<usize>,

    /// Ignore elevation changes up to this many meters between points
    #[arg(long)]
    gain_eps: Option<f64>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Route CSV files to inspect
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Serialize, Debug)]
struct FileReport {
    file: String,
    points: usize,
    summary: SplitSummary,
    segments: Vec<Segment>,
}

#[derive(Serialize, Debug)]
struct Report<'a> {
    generated_at: String,
    params: &'a SplitParams,
    files: &'a [FileReport],
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Splits(args) => args.verbose,
        Command::Inspect(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Splits(args) => handle_splits(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_splits(args: SplitsArgs) -> Result<()> {
    let params = resolve_params(&args)?;
    params.validate()?;
    debug!(?params, "split parameters");

    let t_compute = Instant::now();
    let reports = args
        .inputs
        .par_iter()
        .map(|path| -> Result<FileReport> {
            let route = load_route(path)?;
            let segments = compute_splits(&route, &params)
                .with_context(|| format!("failed to split {}", path.display()))?;
            Ok(FileReport {
                file: path.display().to_string(),
                points: route.count(),
                summary: summarize(&segments),
                segments,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if args.verbose {
        info!(
            "Compute stage: {:.1} ms ({} files)",
            t_compute.elapsed().as_secs_f64() * 1000.0,
            reports.len()
        );
    }
    for report in &reports {
        info!(
            "{}: {} points, {} segments, {:.1} up / {:.1} down",
            report.file,
            report.points,
            report.summary.segments,
            report.summary.elevation_up,
            report.summary.elevation_down
        );
    }

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        write_split_rows(&reports, &mut writer)?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        write_split_rows(&reports, &mut writer)?;
        info!("Wrote splits CSV: {}", args.output.display());
    }

    if let Some(path) = args.json.as_ref() {
        write_json_report(&params, &reports, path)?;
        info!("Wrote JSON report: {}", path.display());
    }

    Ok(())
}

fn resolve_params(args: &SplitsArgs) -> Result<SplitParams> {
    let mut params = match args.config.as_ref() {
        Some(path) => load_params(path)?,
        None => SplitParams::default(),
    };

    if let Some(step) = args.points {
        if args.series.is_some() {
            warn!("--series has no effect together with --points");
        }
        params.mode = SplitMode::Points { step };
    } else if args.series.is_some() || args.interval.is_some() {
        let (series, amount) = match params.mode {
            SplitMode::Interval { series, amount } => (series, amount),
            SplitMode::Points { .. } => (SeriesKey::Distance, DEFAULT_INTERVAL),
        };
        params.mode = SplitMode::Interval {
            series: args.series.unwrap_or(series),
            amount: args.interval.unwrap_or(amount),
        };
    }

    if let Some(eps) = args.gain_eps {
        params.gain_eps = eps;
    }
    Ok(params)
}

fn load_params(path: &Path) -> Result<SplitParams> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    SplitParams::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn load_route(path: &Path) -> Result<Route> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("route");
    read_route(name, file).with_context(|| format!("failed to parse {}", path.display()))
}

/// Read a route from CSV. Unknown columns are skipped; columns left entirely blank are
/// treated as missing series.
fn read_route<R: Read>(name: &str, input: R) -> Result<Route> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers()?.clone();

    let mut columns: Vec<(usize, SeriesKey, Vec<Option<f64>>)> = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        match SeriesKey::from_name(header) {
            Some(key) => {
                if columns.iter().any(|(_, existing, _)| *existing == key) {
                    bail!("duplicate column '{}'", header);
                }
                columns.push((idx, key, Vec::new()));
            }
            None => debug!("skipping unknown column '{}'", header),
        }
    }
    if columns.is_empty() {
        return Err(anyhow!("no known series columns in header"));
    }

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        for (idx, key, values) in columns.iter_mut() {
            let cell = record.get(*idx).map(str::trim).unwrap_or("");
            if cell.is_empty() {
                values.push(None);
                continue;
            }
            let value: f64 = cell
                .parse()
                .with_context(|| format!("row {}: invalid {} value '{}'", row + 1, key, cell))?;
            values.push(Some(value));
        }
    }

    let mut route = Route::new(name);
    for (_, key, values) in columns {
        let present = values.iter().filter(|v| v.is_some()).count();
        if present == 0 {
            debug!("column {} is empty", key);
            continue;
        }
        if present != values.len() {
            bail!(
                "column {} has {} blank cells",
                key,
                values.len() - present
            );
        }
        route.insert_series(key, values.into_iter().flatten().collect())?;
    }
    Ok(route)
}

fn write_split_rows<W: Write>(reports: &[FileReport], writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record([
        "file",
        "segment",
        "start_index",
        "end_index",
        "points",
        "distance",
        "duration",
        "elevation_delta",
        "elevation_up",
        "elevation_down",
        "elevation_max",
        "elevation_avg",
    ])?;

    for report in reports {
        for segment in &report.segments {
            writer.write_record([
                report.file.clone(),
                segment.number.to_string(),
                segment.start_index.to_string(),
                segment.end_index.to_string(),
                segment.points.to_string(),
                format!("{:.3}", segment.distance),
                format!("{:.3}", segment.duration),
                format!("{:.3}", segment.elevation_delta),
                format!("{:.3}", segment.elevation_up),
                format!("{:.3}", segment.elevation_down),
                segment
                    .elevation_max
                    .map(|v| format!("{:.3}", v))
                    .unwrap_or_default(),
                segment
                    .elevation_avg
                    .map(|v| format!("{:.3}", v))
                    .unwrap_or_default(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn write_json_report(params: &SplitParams, reports: &[FileReport], path: &Path) -> Result<()> {
    let report = Report {
        generated_at: Utc::now().to_rfc3339(),
        params,
        files: reports,
    };
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &report)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    inspect_routes(&args.inputs, &mut out)
}

/// Print one line per readable route; fails after the listing if any input was unreadable.
fn inspect_routes<W: Write>(inputs: &[PathBuf], out: &mut W) -> Result<()> {
    let mut failed = 0usize;
    for path in inputs {
        match load_route(path) {
            Ok(route) => {
                let names: Vec<&str> = route
                    .available_series()
                    .into_iter()
                    .map(|key| key.name())
                    .collect();
                writeln!(
                    out,
                    "{}: {} points, series: {}",
                    path.display(),
                    route.count(),
                    names.join(", ")
                )?;
                if route.has(SeriesKey::Elevation) && !route.has_corrected_elevations() {
                    debug!("{}: elevations are uncorrected", path.display());
                }
            }
            Err(err) => {
                warn!("{}: {:#}", path.display(), err);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} inputs could not be read", failed, inputs.len());
    }
    Ok(())
}
