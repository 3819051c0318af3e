use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use rayon::prelude::*;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use zepp_track::series::{count_sentinels, unify_timeline};
use zepp_track::{
    accumulate, assemble, workout_file_stem, write_track, ExportFormat, ParsePolicy, Params,
    RawTrackData, WorkoutDetail, WorkoutHistory, WorkoutSummary,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Export Zepp / Mi Fit workouts to GPX, GeoJSON or CSV", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconstruct tracks from saved history/detail payloads and write one file per workout
    Export(ExportArgs),
    /// Report the decoded sensor streams of saved detail payloads
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Saved history pages (`history.json` responses)
    #[arg(long = "history", required = true, num_args = 1.., value_hint = ValueHint::FilePath)]
    history: Vec<PathBuf>,

    /// Directory holding `detail_<trackid>.json` responses
    #[arg(long, default_value = "./workouts", value_hint = ValueHint::DirPath)]
    details: PathBuf,

    /// File format of the exported workouts
    #[arg(short = 'f', long, env = "FILE_FORMAT", value_enum, default_value_t = FormatOpt::Gpx)]
    file_format: FormatOpt,

    /// Directory where the exported workouts are stored
    #[arg(short = 'o', long, env = "OUTPUT_DIRECTORY", default_value = "./workouts", value_hint = ValueHint::DirPath)]
    output_directory: PathBuf,

    /// Start date in YYYY-MM-DD format (UTC, inclusive)
    #[arg(long, env = "START_DATE")]
    start_date: Option<String>,

    /// End date in YYYY-MM-DD format (UTC, inclusive)
    #[arg(long, env = "END_DATE")]
    end_date: Option<String>,

    /// Fail a workout on malformed samples instead of decoding them as 0
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Leave altitude, heart rate and cadence empty when the workout never recorded them
    #[arg(long, action = ArgAction::SetTrue)]
    omit_absent_streams: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Profile major stages with timings
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Saved detail payloads to inspect
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output report path (stdout when omitted)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatOpt {
    Gpx,
    Geojson,
    Csv,
}

impl From<FormatOpt> for ExportFormat {
    fn from(value: FormatOpt) -> Self {
        match value {
            FormatOpt::Gpx => ExportFormat::Gpx,
            FormatOpt::Geojson => ExportFormat::GeoJson,
            FormatOpt::Csv => ExportFormat::Csv,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Export(args) => args.verbose,
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
        Command::Export(args) => handle_export(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

enum Outcome {
    Exported,
    Empty,
    Failed,
}

fn handle_export(args: ExportArgs) -> Result<()> {
    let start_ts = parse_date_bound(args.start_date.as_deref(), false)?;
    let end_ts = parse_date_bound(args.end_date.as_deref(), true)?;
    if let (Some(start), Some(end)) = (start_ts, end_ts) {
        if start > end {
            return Err(anyhow!("start date must not be after end date"));
        }
    }

    let params = Params {
        parse_policy: if args.strict {
            ParsePolicy::Strict
        } else {
            ParsePolicy::Lenient
        },
        omit_absent_streams: args.omit_absent_streams,
    };
    let format: ExportFormat = args.file_format.into();

    let t_load = Instant::now();
    let mut summaries = Vec::new();
    for path in &args.history {
        summaries.extend(load_history(path)?.summary);
    }
    let total = summaries.len();
    let summaries = dedup_summaries(summaries);
    let selected = filter_by_date(summaries, start_ts, end_ts);
    info!("Workouts found: {}, after date filter: {}", total, selected.len());
    if args.profile || args.verbose {
        info!("Load stage: {:.1} ms", t_load.elapsed().as_secs_f64() * 1000.0);
    }

    fs::create_dir_all(&args.output_directory).with_context(|| {
        format!("failed to create {}", args.output_directory.display())
    })?;

    let t_export = Instant::now();
    let outcomes: Vec<Outcome> = selected
        .par_iter()
        .map(|summary| {
            match export_workout(summary, &args.details, &args.output_directory, format, &params) {
                Ok(Some(path)) => {
                    info!("Exported: {}", path.display());
                    Outcome::Exported
                }
                Ok(None) => {
                    warn!("Workout {} skipped: no GPS samples", summary.trackid);
                    Outcome::Empty
                }
                Err(err) => {
                    warn!("Workout {} failed: {:#}", summary.trackid, err);
                    Outcome::Failed
                }
            }
        })
        .collect();

    let exported = outcomes.iter().filter(|o| matches!(o, Outcome::Exported)).count();
    let empty = outcomes.iter().filter(|o| matches!(o, Outcome::Empty)).count();
    let failed = outcomes.iter().filter(|o| matches!(o, Outcome::Failed)).count();
    if args.profile || args.verbose {
        info!("Export stage: {:.1} ms", t_export.elapsed().as_secs_f64() * 1000.0);
    }
    info!(
        "Done: {} exported, {} without GPS, {} failed",
        exported, empty, failed
    );
    Ok(())
}

/// Assemble and write one workout. `Ok(None)` means it had no GPS samples.
fn export_workout(
    summary: &WorkoutSummary,
    details_dir: &Path,
    output_dir: &Path,
    format: ExportFormat,
    params: &Params,
) -> Result<Option<PathBuf>> {
    let detail_path = details_dir.join(format!("detail_{}.json", summary.trackid));
    let detail = load_detail(&detail_path)?;
    let points = assemble(summary, &detail, params)?;
    if points.is_empty() {
        return Ok(None);
    }
    debug!("Workout {}: {} points", summary.trackid, points.len());

    let stem = workout_file_stem(summary.start_time()?);
    let path = output_dir.join(format!("{}.{}", stem, format.extension()));
    let file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    write_track(format, summary, &points, BufWriter::new(file))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(Some(path))
}

/// Saved payloads are either the full `{code, message, data}` response or its `data`.
fn unwrap_envelope(json: JsonValue) -> JsonValue {
    match json {
        JsonValue::Object(mut map) if map.contains_key("code") && map.contains_key("data") => {
            map.remove("data").unwrap_or(JsonValue::Null)
        }
        other => other,
    }
}

fn load_history(path: &Path) -> Result<WorkoutHistory> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let json: JsonValue = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let history: WorkoutHistory = serde_json::from_value(unwrap_envelope(json))
        .with_context(|| format!("{} is not a workout history page", path.display()))?;
    Ok(history)
}

fn load_detail(path: &Path) -> Result<WorkoutDetail> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let json: JsonValue = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let detail: WorkoutDetail = serde_json::from_value(unwrap_envelope(json))
        .with_context(|| format!("{} is not a workout detail", path.display()))?;
    Ok(detail)
}

// Keep the first occurrence of every trackid; pages may overlap.
fn dedup_summaries(summaries: Vec<WorkoutSummary>) -> Vec<WorkoutSummary> {
    let mut seen = HashSet::new();
    summaries
        .into_iter()
        .filter(|s| seen.insert(s.trackid.clone()))
        .collect()
}

fn filter_by_date(
    summaries: Vec<WorkoutSummary>,
    start_ts: Option<i64>,
    end_ts: Option<i64>,
) -> Vec<WorkoutSummary> {
    summaries
        .into_iter()
        .filter(|s| match s.start_epoch_seconds() {
            Ok(ts) => {
                start_ts.map_or(true, |start| ts >= start) && end_ts.map_or(true, |end| ts <= end)
            }
            Err(err) => {
                warn!("Skipping workout: {}", err);
                false
            }
        })
        .collect()
}

/// Epoch seconds of the start (00:00:00) or end (23:59:59) of a UTC date.
fn parse_date_bound(date: Option<&str>, is_end: bool) -> Result<Option<i64>> {
    let Some(date) = date.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}': expected YYYY-MM-DD", date))?;
    let time = if is_end {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| anyhow!("invalid time of day"))?;
    Ok(Some(day.and_time(time).and_utc().timestamp()))
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let mut report = String::new();

    for path in &args.inputs {
        let detail = load_detail(path)?;
        let raw = RawTrackData::decode(&detail, ParsePolicy::Lenient)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        inspect_report(&mut report, path, &detail, &raw);
    }

    match args.output.as_ref() {
        Some(output) => {
            fs::write(output, &report)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!("Inspection report written: {}", output.display());
        }
        None => print!("{}", report),
    }
    Ok(())
}

fn inspect_report(report: &mut String, path: &Path, detail: &WorkoutDetail, raw: &RawTrackData) {
    let track_times = accumulate(&raw.times);
    let hr_times = accumulate(&raw.hrtimes);
    let step_times = accumulate(&raw.steptimes);
    let timeline = unify_timeline(&[&track_times, &hr_times, &step_times]);

    let _ = writeln!(report, "FILE: {}", path.display());
    let _ = writeln!(report, "  trackid: {}", detail.trackid);
    let _ = writeln!(report, "  streams:");
    let streams: [(&str, &[i64]); 9] = [
        ("time", &raw.times),
        ("latitude", &raw.lat),
        ("longitude", &raw.lon),
        ("altitude", &raw.alt),
        ("heart_rate.delta", &raw.hrtimes),
        ("heart_rate.bpm", &raw.hr),
        ("gait.delta", &raw.steptimes),
        ("gait.stride", &raw.stride),
        ("gait.cadence", &raw.cadence),
    ];
    for (name, values) in streams {
        let _ = writeln!(
            report,
            "    - {}: samples={}, missing={}",
            name,
            values.len(),
            count_sentinels(values)
        );
    }
    let _ = writeln!(report, "  axes:");
    for (name, axis) in [
        ("position", &track_times),
        ("heart_rate", &hr_times),
        ("gait", &step_times),
    ] {
        let span = axis.last().map_or("n/a".into(), |s| format!("{}s", s));
        let _ = writeln!(report, "    - {}: samples={}, span={}", name, axis.len(), span);
    }
    let _ = writeln!(report, "  unified_timeline: {} entries", timeline.len());
    if raw.lat.len() != raw.times.len() {
        let _ = writeln!(
            report,
            "  warning: {} position rows for {} time samples",
            raw.lat.len(),
            raw.times.len()
        );
    }
    if raw.lat.is_empty() {
        let _ = writeln!(report, "  warning: no GPS samples, export would be skipped");
    }
    report.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(trackid: &str) -> WorkoutSummary {
        serde_json::from_value(serde_json::json!({ "trackid": trackid })).unwrap()
    }

    #[test]
    fn date_bounds_cover_whole_day() {
        assert_eq!(parse_date_bound(None, false).unwrap(), None);
        assert_eq!(
            parse_date_bound(Some("2024-01-01"), false).unwrap(),
            Some(1_704_067_200)
        );
        assert_eq!(
            parse_date_bound(Some("2024-01-01"), true).unwrap(),
            Some(1_704_067_200 + 86_399)
        );
        assert!(parse_date_bound(Some("01/02/2024"), false).is_err());
    }

    #[test]
    fn date_filter_is_inclusive() {
        let summaries = vec![
            summary("1704067199"),
            summary("1704067200"),
            summary("1704153599"),
            summary("1704153600"),
            summary("garbage"),
        ];
        let kept = filter_by_date(summaries, Some(1_704_067_200), Some(1_704_153_599));
        let ids: Vec<&str> = kept.iter().map(|s| s.trackid.as_str()).collect();
        assert_eq!(ids, vec!["1704067200", "1704153599"]);
    }

    #[test]
    fn duplicate_trackids_dropped() {
        let kept = dedup_summaries(vec![summary("1"), summary("2"), summary("1")]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn envelope_is_optional() {
        let wrapped = serde_json::json!({ "code": 1, "message": "ok", "data": { "next": -1 } });
        let bare = serde_json::json!({ "next": -1 });
        assert_eq!(unwrap_envelope(wrapped), bare);
        assert_eq!(unwrap_envelope(bare.clone()), bare);
    }

    #[test]
    fn exports_workout_files() {
        let dir = tempfile::tempdir().unwrap();
        let details = dir.path().join("details");
        let out = dir.path().join("out");
        fs::create_dir_all(&details).unwrap();
        fs::create_dir_all(&out).unwrap();
        fs::write(
            details.join("detail_1704067200.json"),
            r#"{"code": 1, "message": "ok", "data": {
                "trackid": 1704067200,
                "time": "0;60;120",
                "longitude_latitude": "100000000,200000000;0,0;0,0",
                "altitude": "500;510;520"
            }}"#,
        )
        .unwrap();
        fs::write(
            details.join("detail_1704153600.json"),
            r#"{"trackid": 1704153600, "longitude_latitude": null}"#,
        )
        .unwrap();

        let params = Params::default();
        let written = export_workout(
            &summary("1704067200"),
            &details,
            &out,
            ExportFormat::GeoJson,
            &params,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            written.file_name().unwrap(),
            "Workout--2024-01-01--00-00-00-000Z.geojson"
        );
        let json: JsonValue = serde_json::from_str(&fs::read_to_string(&written).unwrap()).unwrap();
        assert_eq!(json["features"].as_array().unwrap().len(), 4);

        let skipped =
            export_workout(&summary("1704153600"), &details, &out, ExportFormat::Gpx, &params)
                .unwrap();
        assert!(skipped.is_none());

        let missing = export_workout(&summary("42"), &details, &out, ExportFormat::Gpx, &params);
        assert!(missing.is_err());
    }

    #[test]
    fn inspect_reports_streams() {
        let detail = WorkoutDetail {
            trackid: "7".into(),
            time: Some("0;60".into()),
            longitude_latitude: Some("1,2".into()),
            altitude: Some("-2000000;5".into()),
            ..WorkoutDetail::default()
        };
        let raw = RawTrackData::decode(&detail, ParsePolicy::Lenient).unwrap();
        let mut report = String::new();
        inspect_report(&mut report, Path::new("detail_7.json"), &detail, &raw);
        assert!(report.contains("- altitude: samples=2, missing=1"));
        assert!(report.contains("- position: samples=2, span=60s"));
        assert!(report.contains("1 position rows for 2 time samples"));
    }
}
