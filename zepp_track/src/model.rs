//! Backend payloads consumed by the engine and the trackpoints it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::TrackError;

/// Envelope wrapping every backend response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// One page of the workout history listing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkoutHistory {
    /// Track id to request the next page from, `-1` on the last page.
    pub next: i64,
    #[serde(default)]
    pub summary: Vec<WorkoutSummary>,
}

impl WorkoutHistory {
    pub fn is_last_page(&self) -> bool {
        self.next == -1
    }
}

/// Workout summary as listed by the history endpoint. Numeric values arrive
/// as strings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkoutSummary {
    /// Workout start, in epoch seconds.
    #[serde(deserialize_with = "string_or_number")]
    pub trackid: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub dis: String,
    #[serde(default)]
    pub calorie: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub run_time: String,
    #[serde(default)]
    pub avg_heart_rate: String,
    #[serde(rename = "type", default)]
    pub sport_type: i64,
    #[serde(default)]
    pub sport_title: Option<String>,
    #[serde(default)]
    pub total_step: Option<i64>,
    #[serde(default)]
    pub altitude_ascend: Option<f64>,
    #[serde(default)]
    pub altitude_descend: Option<f64>,
}

impl WorkoutSummary {
    pub fn start_epoch_seconds(&self) -> Result<i64, TrackError> {
        self.trackid.trim().parse().map_err(|_| {
            TrackError::InvalidSummary(format!("trackid '{}' is not epoch seconds", self.trackid))
        })
    }

    pub fn end_epoch_seconds(&self) -> Result<i64, TrackError> {
        self.end_time.trim().parse().map_err(|_| {
            TrackError::InvalidSummary(format!("end_time '{}' is not epoch seconds", self.end_time))
        })
    }

    pub fn start_time(&self) -> Result<DateTime<Utc>, TrackError> {
        let secs = self.start_epoch_seconds()?;
        DateTime::from_timestamp(secs, 0).ok_or(TrackError::TimestampOutOfRange(secs))
    }

    /// Distance in meters, `0.0` when the backend reported none.
    pub fn distance_m(&self) -> f64 {
        self.dis.trim().parse().unwrap_or(0.0)
    }
}

/// Raw per-sensor strings of one workout. Absent streams decode as empty.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkoutDetail {
    #[serde(default, deserialize_with = "string_or_number")]
    pub trackid: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub longitude_latitude: Option<String>,
    #[serde(default)]
    pub altitude: Option<String>,
    #[serde(default)]
    pub accuracy: Option<String>,
    #[serde(default)]
    pub heart_rate: Option<String>,
    #[serde(default)]
    pub gait: Option<String>,
    #[serde(default)]
    pub pace: Option<String>,
    #[serde(default)]
    pub lap: Option<String>,
}

/// One reconstructed trackpoint in export units.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExportablePoint {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub heart_rate: Option<i64>,
    pub cadence: Option<i64>,
}

// The history endpoint sends `trackid` as a string, the detail endpoint as a number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(v) => v.to_string(),
        Raw::Float(v) => v.to_string(),
    })
}
