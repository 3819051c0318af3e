//! Serialization of reconstructed tracks to GPX 1.1, GeoJSON and CSV.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use super::model::{ExportablePoint, WorkoutSummary};
use super::TrackError;

const GPX_CREATOR: &str = "zepp-export";
const GPX_NS: &str = "http://www.topografix.com/GPX/1/1";
const GPX_SCHEMA: &str =
    "http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const TPX_NS: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExportFormat {
    Gpx,
    GeoJson,
    Csv,
}

impl ExportFormat {
    pub fn from_name(name: &str) -> Result<Self, TrackError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gpx" => Ok(ExportFormat::Gpx),
            "geojson" => Ok(ExportFormat::GeoJson),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(TrackError::UnsupportedFormat(name.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Gpx => "gpx",
            ExportFormat::GeoJson => "geojson",
            ExportFormat::Csv => "csv",
        }
    }
}

/// File name (without extension) for a workout starting at `start`, e.g.
/// `Workout--2024-01-01--07-30-00-000Z`.
pub fn workout_file_stem(start: DateTime<Utc>) -> String {
    format!("Workout--{}", start.format("%Y-%m-%d--%H-%M-%S-%3fZ"))
}

pub fn write_track<W: Write>(
    format: ExportFormat,
    summary: &WorkoutSummary,
    points: &[ExportablePoint],
    out: W,
) -> Result<(), TrackError> {
    match format {
        ExportFormat::Gpx => write_gpx(summary, points, out),
        ExportFormat::GeoJson => write_geojson(summary, points, out),
        ExportFormat::Csv => write_csv(points, out),
    }
}

fn iso_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// GPX 1.1 with heart rate and cadence in Garmin TrackPointExtension v1.
pub fn write_gpx<W: Write>(
    summary: &WorkoutSummary,
    points: &[ExportablePoint],
    out: W,
) -> Result<(), TrackError> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("gpx").with_attributes([
        ("version", "1.1"),
        ("creator", GPX_CREATOR),
        ("xmlns:xsi", XSI_NS),
        ("xmlns", GPX_NS),
        ("xsi:schemaLocation", GPX_SCHEMA),
        ("xmlns:gpxtpx", TPX_NS),
    ])))?;
    writer.write_event(Event::Start(BytesStart::new("trk")))?;
    writer
        .create_element("name")
        .write_text_content(BytesText::new(&format!("Workout {}", summary.trackid)))?;
    writer
        .create_element("type")
        .write_text_content(BytesText::new(&summary.sport_type.to_string()))?;
    writer.write_event(Event::Start(BytesStart::new("trkseg")))?;

    for point in points {
        let lat = point.latitude.to_string();
        let lon = point.longitude.to_string();
        let trkpt = BytesStart::new("trkpt")
            .with_attributes([("lat", lat.as_str()), ("lon", lon.as_str())]);
        writer.write_event(Event::Start(trkpt))?;
        if let Some(altitude) = point.altitude {
            writer
                .create_element("ele")
                .write_text_content(BytesText::new(&altitude.to_string()))?;
        }
        writer
            .create_element("time")
            .write_text_content(BytesText::new(&iso_time(&point.time)))?;

        if point.heart_rate.is_some() || point.cadence.is_some() {
            writer.write_event(Event::Start(BytesStart::new("extensions")))?;
            writer.write_event(Event::Start(BytesStart::new("gpxtpx:TrackPointExtension")))?;
            if let Some(hr) = point.heart_rate {
                writer
                    .create_element("gpxtpx:hr")
                    .write_text_content(BytesText::new(&hr.to_string()))?;
            }
            if let Some(cad) = point.cadence {
                writer
                    .create_element("gpxtpx:cad")
                    .write_text_content(BytesText::new(&cad.to_string()))?;
            }
            writer.write_event(Event::End(BytesEnd::new("gpxtpx:TrackPointExtension")))?;
            writer.write_event(Event::End(BytesEnd::new("extensions")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("trkpt")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("trkseg")))?;
    writer.write_event(Event::End(BytesEnd::new("trk")))?;
    writer.write_event(Event::End(BytesEnd::new("gpx")))?;
    writer.into_inner().flush()?;
    Ok(())
}

/// One `Point` feature per trackpoint followed by a `LineString` of the whole
/// track.
pub fn geojson_value(summary: &WorkoutSummary, points: &[ExportablePoint]) -> JsonValue {
    let coordinates =
        |p: &ExportablePoint| json!([p.longitude, p.latitude, p.altitude.unwrap_or(0.0)]);

    let mut features: Vec<JsonValue> = points
        .iter()
        .map(|p| {
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": coordinates(p) },
                "properties": {
                    "time": iso_time(&p.time),
                    "heart_rate": p.heart_rate,
                    "cadence": p.cadence,
                    "track_id": summary.trackid,
                },
            })
        })
        .collect();

    features.push(json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": points.iter().map(coordinates).collect::<Vec<_>>(),
        },
        "properties": {
            "type": "track",
            "track_id": summary.trackid,
            "start_time": points.first().map(|p| iso_time(&p.time)),
            "end_time": points.last().map(|p| iso_time(&p.time)),
            "distance_m": summary.distance_m(),
        },
    }));

    json!({ "type": "FeatureCollection", "features": features })
}

pub fn write_geojson<W: Write>(
    summary: &WorkoutSummary,
    points: &[ExportablePoint],
    mut out: W,
) -> Result<(), TrackError> {
    serde_json::to_writer_pretty(&mut out, &geojson_value(summary, points))?;
    out.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct CsvRow {
    time: String,
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    heart_rate: Option<i64>,
    cadence: Option<i64>,
}

pub fn write_csv<W: Write>(points: &[ExportablePoint], out: W) -> Result<(), TrackError> {
    let mut writer = csv::Writer::from_writer(out);
    for p in points {
        writer.serialize(CsvRow {
            time: iso_time(&p.time),
            latitude: p.latitude,
            longitude: p.longitude,
            altitude: p.altitude,
            heart_rate: p.heart_rate,
            cadence: p.cadence,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> WorkoutSummary {
        serde_json::from_value(json!({ "trackid": "1704067200", "type": 1, "dis": "1234.5" })).unwrap()
    }

    fn points() -> Vec<ExportablePoint> {
        let start = DateTime::from_timestamp(1_704_067_200, 0).unwrap();
        vec![
            ExportablePoint {
                time: start,
                latitude: -22.9,
                longitude: -43.2,
                altitude: Some(5.1),
                heart_rate: Some(135),
                cadence: None,
            },
            ExportablePoint {
                time: start + chrono::Duration::seconds(60),
                latitude: -22.91,
                longitude: -43.21,
                altitude: None,
                heart_rate: None,
                cadence: None,
            },
        ]
    }

    #[test]
    fn format_names() {
        assert_eq!(ExportFormat::from_name("GPX").unwrap(), ExportFormat::Gpx);
        assert_eq!(ExportFormat::from_name("geojson").unwrap().extension(), "geojson");
        assert!(matches!(
            ExportFormat::from_name("kml"),
            Err(TrackError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn file_stem_from_start_time() {
        let start = DateTime::from_timestamp(1_704_067_200, 0).unwrap();
        assert_eq!(workout_file_stem(start), "Workout--2024-01-01--00-00-00-000Z");
    }

    #[test]
    fn gpx_is_readable() {
        let mut buf = Vec::new();
        write_gpx(&summary(), &points(), &mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.contains("<name>Workout 1704067200</name>"));
        assert!(text.contains("<gpxtpx:hr>135</gpxtpx:hr>"));
        assert!(!text.contains("<gpxtpx:cad>"));
        assert!(text.contains("<time>2024-01-01T00:00:00.000Z</time>"));

        let parsed = gpx::read(std::io::Cursor::new(buf)).unwrap();
        let segment = &parsed.tracks[0].segments[0];
        assert_eq!(segment.points.len(), 2);
        assert!((segment.points[0].point().y() + 22.9).abs() < 1e-9);
        assert!((segment.points[1].point().x() + 43.21).abs() < 1e-9);
        assert_eq!(segment.points[0].elevation, Some(5.1));
        assert_eq!(segment.points[1].elevation, None);
    }

    #[test]
    fn geojson_has_points_and_line() {
        let value = geojson_value(&summary(), &points());
        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["geometry"]["coordinates"], json!([-43.2, -22.9, 5.1]));
        assert_eq!(features[1]["geometry"]["coordinates"], json!([-43.21, -22.91, 0.0]));
        assert_eq!(features[0]["properties"]["heart_rate"], json!(135));
        assert!(features[1]["properties"]["heart_rate"].is_null());
        let line = &features[2];
        assert_eq!(line["geometry"]["type"], "LineString");
        assert_eq!(line["properties"]["start_time"], "2024-01-01T00:00:00.000Z");
        assert_eq!(line["properties"]["end_time"], "2024-01-01T00:01:00.000Z");
        assert_eq!(line["properties"]["distance_m"], json!(1234.5));
    }

    #[test]
    fn geojson_of_empty_track() {
        let value = geojson_value(&summary(), &[]);
        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert!(features[0]["properties"]["start_time"].is_null());
    }

    #[test]
    fn csv_rows_leave_missing_cells_empty() {
        let mut buf = Vec::new();
        write_csv(&points(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time,latitude,longitude,altitude,heart_rate,cadence");
        assert_eq!(lines[1], "2024-01-01T00:00:00.000Z,-22.9,-43.2,5.1,135,");
        assert_eq!(lines[2], "2024-01-01T00:01:00.000Z,-22.91,-43.21,,,");
    }
}
