//! Encoding constants of the detail payload and tunable assembly parameters.

use serde::{Deserialize, Serialize};

/// Reserved sample value meaning "no reading".
pub const NO_VALUE: i64 = -2_000_000;

/// Latitude/longitude are fixed-point integers in units of 1e-8 degrees.
pub const COORDINATE_SCALE: f64 = 100_000_000.0;

/// Altitude is a fixed-point integer in centimeters.
pub const ALTITUDE_SCALE: f64 = 100.0;

pub const ROW_SEPARATOR: char = ';';
pub const FIELD_SEPARATOR: char = ',';

/// Heart-rate rows may omit their delta; the device then sampled at 1 Hz.
pub const HR_DELTA_FALLBACK: i64 = 1;

/// Sub-field positions inside composite rows.
pub mod subfield {
    pub const POSITION_LAT: usize = 0;
    pub const POSITION_LON: usize = 1;

    pub const HR_DELTA: usize = 0;
    pub const HR_BPM: usize = 1;

    pub const GAIT_DELTA: usize = 0;
    pub const GAIT_STRIDE: usize = 2;
    pub const GAIT_CADENCE: usize = 3;
}

/// How malformed tokens are treated while decoding.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParsePolicy {
    /// Non-numeric tokens become `0` and length mismatches are truncated.
    Lenient,
    /// Any malformed token or mismatched table fails the workout.
    Strict,
}

impl Default for ParsePolicy {
    fn default() -> Self {
        ParsePolicy::Lenient
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Params {
    pub parse_policy: ParsePolicy,
    /// Emit `None` for altitude, heart rate and cadence when the workout
    /// recorded no samples for that stream instead of the interpolated `0`.
    pub omit_absent_streams: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            parse_policy: ParsePolicy::Lenient,
            omit_absent_streams: false,
        }
    }
}
