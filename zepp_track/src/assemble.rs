//! Merge the decoded streams of a workout into timestamped trackpoints.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::{ParsePolicy, Params, ALTITUDE_SCALE, COORDINATE_SCALE};
use super::decode::RawTrackData;
use super::interp::resample_column;
use super::model::{ExportablePoint, WorkoutDetail, WorkoutSummary};
use super::series::{accumulate, clean_sentinels, unify_timeline};
use super::TrackError;

/// Which optional streams carried at least one sample.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamPresence {
    pub altitude: bool,
    pub heart_rate: bool,
    pub cadence: bool,
}

/// Every stream resampled onto the unified timeline, in raw integer units.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ResampledTrack {
    pub start_time: i64,
    /// Seconds since `start_time`, strictly ascending.
    pub timeline: Vec<i64>,
    pub lat: Vec<i64>,
    pub lon: Vec<i64>,
    pub alt: Vec<i64>,
    pub hr: Vec<i64>,
    pub stride: Vec<i64>,
    pub cadence: Vec<i64>,
    pub presence: StreamPresence,
}

impl ResampledTrack {
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    /// Convert to export units with absolute timestamps.
    pub fn points(&self, params: &Params) -> Result<Vec<ExportablePoint>, TrackError> {
        let keep = |present: bool| present || !params.omit_absent_streams;
        let mut points = Vec::with_capacity(self.len());
        for (i, &offset) in self.timeline.iter().enumerate() {
            let secs = self.start_time.saturating_add(offset);
            let time = DateTime::from_timestamp(secs, 0)
                .ok_or(TrackError::TimestampOutOfRange(secs))?;
            points.push(ExportablePoint {
                time,
                latitude: self.lat[i] as f64 / COORDINATE_SCALE,
                longitude: self.lon[i] as f64 / COORDINATE_SCALE,
                altitude: keep(self.presence.altitude)
                    .then(|| self.alt[i] as f64 / ALTITUDE_SCALE),
                heart_rate: keep(self.presence.heart_rate).then(|| self.hr[i]),
                cadence: keep(self.presence.cadence).then(|| self.cadence[i]),
            });
        }
        Ok(points)
    }
}

/// Reconstruct the trackpoints of one workout.
///
/// A workout without position samples yields an empty vector; the caller
/// decides whether to skip it.
pub fn assemble(
    summary: &WorkoutSummary,
    detail: &WorkoutDetail,
    params: &Params,
) -> Result<Vec<ExportablePoint>, TrackError> {
    let raw = RawTrackData::from_workout(summary, detail, params.parse_policy)?;
    // position rows need their own time axis to be placed anywhere
    if raw.lat.is_empty() || raw.times.is_empty() {
        debug!(
            trackid = %summary.trackid,
            positions = raw.lat.len(),
            times = raw.times.len(),
            "no usable position samples"
        );
        return Ok(Vec::new());
    }
    resample(&raw, params)?.points(params)
}

/// Accumulate, clean and resample every stream onto the union of the
/// position, heart-rate and gait time axes.
pub fn resample(raw: &RawTrackData, params: &Params) -> Result<ResampledTrack, TrackError> {
    let track_times = accumulate(&raw.times);
    let hr_times = accumulate(&raw.hrtimes);
    let step_times = accumulate(&raw.steptimes);
    let timeline = unify_timeline(&[&track_times, &hr_times, &step_times]);

    // lat, lon and hr values are stored as deltas
    let lat = clean_sentinels(&accumulate(&raw.lat));
    let lon = clean_sentinels(&accumulate(&raw.lon));
    let hr = clean_sentinels(&accumulate(&raw.hr));
    let alt = clean_sentinels(&raw.alt);
    let stride = clean_sentinels(&raw.stride);
    let cadence = clean_sentinels(&raw.cadence);

    let policy = params.parse_policy;
    let column = |field: &'static str, values: &[i64], axis: &[i64]| {
        let len = aligned_len(field, values.len(), axis.len(), policy)?;
        Ok::<_, TrackError>(resample_column(&values[..len], &axis[..len], &timeline))
    };

    let lat = column("longitude_latitude", &lat, &track_times)?;
    let lon = column("longitude_latitude", &lon, &track_times)?;
    let alt = column("altitude", &alt, &track_times)?;
    let hr = column("heart_rate", &hr, &hr_times)?;
    let stride = column("gait", &stride, &step_times)?;
    let cadence = column("gait", &cadence, &step_times)?;

    Ok(ResampledTrack {
        start_time: raw.start_time,
        timeline,
        lat,
        lon,
        alt,
        hr,
        stride,
        cadence,
        presence: StreamPresence {
            altitude: !raw.alt.is_empty(),
            heart_rate: !raw.hr.is_empty(),
            cadence: !raw.cadence.is_empty(),
        },
    })
}

fn aligned_len(
    field: &'static str,
    values: usize,
    offsets: usize,
    policy: ParsePolicy,
) -> Result<usize, TrackError> {
    // an absent stream resamples to the empty table
    if values == offsets || values == 0 {
        return Ok(values);
    }
    match policy {
        ParsePolicy::Strict => Err(TrackError::StreamLengthMismatch {
            field,
            values,
            offsets,
        }),
        ParsePolicy::Lenient => {
            warn!(field, values, offsets, "stream length mismatch, truncating to the shorter");
            Ok(values.min(offsets))
        }
    }
}
