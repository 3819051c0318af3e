//! Track reconstruction for Zepp / Mi Fit workout payloads.
//!
//! The backend stores every sensor of a workout as a compact delimited string
//! (position deltas, altitude, heart rate, gait). This crate decodes those
//! streams, repairs missing samples, merges them onto one timeline and emits
//! trackpoints that the [`export`] writers turn into GPX, GeoJSON or CSV.

use thiserror::Error;

pub mod assemble;
pub mod config;
pub mod decode;
pub mod export;
pub mod interp;
pub mod model;
pub mod series;

pub use assemble::{assemble, resample, ResampledTrack, StreamPresence};
pub use config::{ParsePolicy, Params};
pub use decode::RawTrackData;
pub use export::{workout_file_stem, write_track, ExportFormat};
pub use interp::{resample_column, StepInterpolator};
pub use model::{ApiResponse, ExportablePoint, WorkoutDetail, WorkoutHistory, WorkoutSummary};
pub use series::{accumulate, clean_sentinels, unify_timeline};

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("malformed {field} row '{row}': {reason}")]
    MalformedField {
        field: &'static str,
        row: String,
        reason: String,
    },
    #[error("{field} has {values} values but its time axis has {offsets} samples")]
    StreamLengthMismatch {
        field: &'static str,
        values: usize,
        offsets: usize,
    },
    #[error("invalid workout summary: {0}")]
    InvalidSummary(String),
    #[error("timestamp {0} is outside the representable range")]
    TimestampOutOfRange(i64),
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("failed to write XML: {0}")]
    Xml(#[from] quick_xml::Error),
}
