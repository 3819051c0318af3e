use zepp_track::{
    assemble, workout_file_stem, write_track, ApiResponse, ExportFormat, ParsePolicy, Params,
    TrackError, WorkoutDetail, WorkoutHistory,
};

const HISTORY: &str = r#"{
    "code": 1,
    "message": "success",
    "data": {
        "next": -1,
        "summary": [
            {
                "trackid": "1704067200",
                "source": "run.source",
                "dis": "5000",
                "calorie": "300",
                "end_time": "1704070800",
                "run_time": "3600",
                "avg_heart_rate": "140",
                "type": 1,
                "app_name": "test_app"
            },
            {
                "trackid": "1704153600",
                "source": "run.source",
                "dis": "0",
                "end_time": "1704157200",
                "type": 52,
                "app_name": "test_app"
            }
        ]
    }
}"#;

const RUN_DETAIL: &str = r#"{
    "code": 1,
    "message": "success",
    "data": {
        "trackid": 1704067200,
        "source": "run.source",
        "time": "0;60;120",
        "longitude_latitude": "-2290000000,-4320000000;-1000000,-1000000;-1000000,-1000000",
        "altitude": "1000;1100;-2000000",
        "heart_rate": "0,130;60,5;60,5",
        "gait": "0,0,90,160;120,0,95,170",
        "pace": "700;710;720"
    }
}"#;

const STRENGTH_DETAIL: &str = r#"{
    "code": 1,
    "message": "success",
    "data": {
        "trackid": 1704153600,
        "source": "run.source",
        "longitude_latitude": null,
        "heart_rate": "0,90;1,1"
    }
}"#;

fn history() -> WorkoutHistory {
    serde_json::from_str::<ApiResponse<WorkoutHistory>>(HISTORY)
        .unwrap()
        .data
}

fn detail(json: &str) -> WorkoutDetail {
    serde_json::from_str::<ApiResponse<WorkoutDetail>>(json)
        .unwrap()
        .data
}

#[test]
fn run_reconstructs_full_track() {
    let history = history();
    let run = &history.summary[0];
    let points = assemble(run, &detail(RUN_DETAIL), &Params::default()).unwrap();

    // position axis 0, 60, 180; heart-rate axis 0, 60, 120; gait axis 0, 120
    let offsets: Vec<i64> = points
        .iter()
        .map(|p| p.time.timestamp() - 1_704_067_200)
        .collect();
    assert_eq!(offsets, vec![0, 60, 120, 180]);

    assert!((points[0].latitude + 22.9).abs() < 1e-12);
    assert!((points[3].latitude + 22.92).abs() < 1e-12);
    assert!((points[3].longitude + 43.22).abs() < 1e-12);

    // trailing altitude sentinel takes the previous reading
    assert_eq!(points[3].altitude, Some(11.0));
    assert_eq!(points[1].altitude, Some(11.0));

    let hr: Vec<Option<i64>> = points.iter().map(|p| p.heart_rate).collect();
    assert_eq!(hr, vec![Some(130), Some(135), Some(140), Some(140)]);
    let cadence: Vec<Option<i64>> = points.iter().map(|p| p.cadence).collect();
    assert_eq!(cadence, vec![Some(160), Some(160), Some(170), Some(170)]);

    let stem = workout_file_stem(run.start_time().unwrap());
    assert_eq!(stem, "Workout--2024-01-01--00-00-00-000Z");
}

#[test]
fn workout_without_gps_is_empty() {
    let history = history();
    let points = assemble(
        &history.summary[1],
        &detail(STRENGTH_DETAIL),
        &Params::default(),
    )
    .unwrap();
    assert!(points.is_empty());
}

#[test]
fn strict_policy_surfaces_malformed_rows() {
    let history = history();
    let mut broken = detail(RUN_DETAIL);
    broken.longitude_latitude = Some("100,200;300".into());
    let params = Params {
        parse_policy: ParsePolicy::Strict,
        ..Params::default()
    };
    let err = assemble(&history.summary[0], &broken, &params).unwrap_err();
    match err {
        TrackError::MalformedField { field, row, .. } => {
            assert_eq!(field, "longitude_latitude");
            assert_eq!(row, "300");
        }
        other => panic!("unexpected error: {other}"),
    }

    // the same payload is accepted leniently
    assert!(assemble(&history.summary[0], &broken, &Params::default()).is_ok());
}

#[test]
fn every_format_writes() {
    let history = history();
    let run = &history.summary[0];
    let points = assemble(run, &detail(RUN_DETAIL), &Params::default()).unwrap();
    for format in [ExportFormat::Gpx, ExportFormat::GeoJson, ExportFormat::Csv] {
        let mut buf = Vec::new();
        write_track(format, run, &points, &mut buf).unwrap();
        assert!(!buf.is_empty(), "{format:?} produced no output");
    }
}
