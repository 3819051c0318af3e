//! Decoding of the delimited per-sensor strings of a workout detail.
//!
//! Scalar streams (`time`, `altitude`) are plain `;`-separated integers.
//! Composite streams (`longitude_latitude`, `heart_rate`, `gait`) hold one
//! `,`-separated row per sample and are decoded into named row records so a
//! reordered vendor payload fails loudly instead of shifting columns.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::{subfield, ParsePolicy, FIELD_SEPARATOR, HR_DELTA_FALLBACK, ROW_SEPARATOR};
use super::model::{WorkoutDetail, WorkoutSummary};
use super::TrackError;

/// Decode one stream into integers.
///
/// With `sub_index` set, every row is split on `,` and only that sub-field is
/// kept; a missing or empty sub-field yields `fallback` (or `0`). Empty rows
/// are discarded and an absent or empty `raw` decodes to an empty vector.
pub fn decode(
    field: &'static str,
    raw: Option<&str>,
    separator: char,
    sub_index: Option<usize>,
    fallback: Option<i64>,
    policy: ParsePolicy,
) -> Result<Vec<i64>, TrackError> {
    rows(raw, separator)
        .map(|row| match sub_index {
            None => parse_token(field, row, row, policy),
            Some(idx) => RowFields::new(field, row, policy).get(idx, fallback),
        })
        .collect()
}

/// Decode a composite stream into row records.
pub fn decode_rows<R: CompositeRow>(
    field: &'static str,
    raw: Option<&str>,
    policy: ParsePolicy,
) -> Result<Vec<R>, TrackError> {
    rows(raw, ROW_SEPARATOR)
        .map(|row| R::from_fields(&RowFields::new(field, row, policy)))
        .collect()
}

fn rows(raw: Option<&str>, separator: char) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(separator)
        .filter(|token| !token.is_empty())
}

/// A composite row record built from its `,`-separated sub-fields.
pub trait CompositeRow: Sized {
    fn from_fields(fields: &RowFields<'_>) -> Result<Self, TrackError>;
}

/// Sub-fields of one composite row, with the context needed for errors.
pub struct RowFields<'a> {
    field: &'static str,
    row: &'a str,
    parts: Vec<&'a str>,
    policy: ParsePolicy,
}

impl<'a> RowFields<'a> {
    pub fn new(field: &'static str, row: &'a str, policy: ParsePolicy) -> Self {
        Self {
            field,
            row,
            parts: row.split(FIELD_SEPARATOR).collect(),
            policy,
        }
    }

    pub fn get(&self, idx: usize, fallback: Option<i64>) -> Result<i64, TrackError> {
        match self.parts.get(idx).filter(|part| !part.is_empty()) {
            Some(part) => parse_token(self.field, self.row, part, self.policy),
            None => match (fallback, self.policy) {
                (Some(value), _) => Ok(value),
                (None, ParsePolicy::Lenient) => Ok(0),
                (None, ParsePolicy::Strict) => Err(TrackError::MalformedField {
                    field: self.field,
                    row: self.row.to_string(),
                    reason: format!("missing sub-field {idx}"),
                }),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRow {
    pub lat_delta: i64,
    pub lon_delta: i64,
}

impl CompositeRow for PositionRow {
    fn from_fields(fields: &RowFields<'_>) -> Result<Self, TrackError> {
        Ok(Self {
            lat_delta: fields.get(subfield::POSITION_LAT, None)?,
            lon_delta: fields.get(subfield::POSITION_LON, None)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateRow {
    pub delta: i64,
    pub bpm: i64,
}

impl CompositeRow for HeartRateRow {
    fn from_fields(fields: &RowFields<'_>) -> Result<Self, TrackError> {
        Ok(Self {
            delta: fields.get(subfield::HR_DELTA, Some(HR_DELTA_FALLBACK))?,
            bpm: fields.get(subfield::HR_BPM, None)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaitRow {
    pub delta: i64,
    pub stride: i64,
    pub cadence: i64,
}

impl CompositeRow for GaitRow {
    fn from_fields(fields: &RowFields<'_>) -> Result<Self, TrackError> {
        Ok(Self {
            delta: fields.get(subfield::GAIT_DELTA, None)?,
            stride: fields.get(subfield::GAIT_STRIDE, None)?,
            cadence: fields.get(subfield::GAIT_CADENCE, None)?,
        })
    }
}

fn parse_token(
    field: &'static str,
    row: &str,
    token: &str,
    policy: ParsePolicy,
) -> Result<i64, TrackError> {
    match policy {
        ParsePolicy::Strict => token
            .trim()
            .parse()
            .map_err(|err| TrackError::MalformedField {
                field,
                row: row.to_string(),
                reason: format!("'{token}' is not an integer ({err})"),
            }),
        ParsePolicy::Lenient => Ok(leading_integer(token).unwrap_or_else(|| {
            debug!(field, token, "non-numeric token decoded as 0");
            0
        })),
    }
}

/// Parse the leading integer of a token: `"12abc"` is 12, `"22.90"` is 22.
fn leading_integer(token: &str) -> Option<i64> {
    let trimmed = token.trim_start();
    let sign_len = usize::from(trimmed.starts_with(|c| c == '+' || c == '-'));
    let digits = trimmed[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    trimmed[..sign_len + digits].parse().ok()
}

/// Every stream of one workout, decoded but not yet accumulated.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RawTrackData {
    /// Workout start in epoch seconds.
    pub start_time: i64,
    pub times: Vec<i64>,
    pub lat: Vec<i64>,
    pub lon: Vec<i64>,
    pub alt: Vec<i64>,
    pub hrtimes: Vec<i64>,
    pub hr: Vec<i64>,
    pub steptimes: Vec<i64>,
    pub stride: Vec<i64>,
    pub cadence: Vec<i64>,
}

impl RawTrackData {
    /// Decode the sensor streams of a detail payload. `start_time` is left at 0.
    pub fn decode(detail: &WorkoutDetail, policy: ParsePolicy) -> Result<Self, TrackError> {
        let positions: Vec<PositionRow> =
            decode_rows("longitude_latitude", detail.longitude_latitude.as_deref(), policy)?;
        let heart: Vec<HeartRateRow> =
            decode_rows("heart_rate", detail.heart_rate.as_deref(), policy)?;
        let gait: Vec<GaitRow> = decode_rows("gait", detail.gait.as_deref(), policy)?;

        Ok(Self {
            times: decode("time", detail.time.as_deref(), ROW_SEPARATOR, None, None, policy)?,
            lat: positions.iter().map(|row| row.lat_delta).collect(),
            lon: positions.iter().map(|row| row.lon_delta).collect(),
            alt: decode("altitude", detail.altitude.as_deref(), ROW_SEPARATOR, None, None, policy)?,
            hrtimes: heart.iter().map(|row| row.delta).collect(),
            hr: heart.iter().map(|row| row.bpm).collect(),
            steptimes: gait.iter().map(|row| row.delta).collect(),
            stride: gait.iter().map(|row| row.stride).collect(),
            cadence: gait.iter().map(|row| row.cadence).collect(),
            ..Self::default()
        })
    }

    pub fn from_workout(
        summary: &WorkoutSummary,
        detail: &WorkoutDetail,
        policy: ParsePolicy,
    ) -> Result<Self, TrackError> {
        Ok(Self {
            start_time: summary.start_epoch_seconds()?,
            ..Self::decode(detail, policy)?
        })
    }
}
