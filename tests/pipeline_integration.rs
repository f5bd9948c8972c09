/// End-to-end tests over in-memory CSV exports.
///
/// Tests verify:
/// 1. Wide displacement tables are fused and differentiated per point
/// 2. Mean velocity and annualized speed on a regular series
/// 3. Right-aligned anomaly overlays on long observed series
/// 4. Map, series and distance queries against the built context
///
/// Run with: cargo test --test pipeline_integration

use chrono::{Duration, NaiveDate};

use defmon_service::anomaly::{AnomalyStatus, BandMode};
use defmon_service::config::AnalysisSettings;
use defmon_service::ingest::{
    load_anomaly_records, load_geolocation, load_prediction_series, load_wide_series, Table,
};
use defmon_service::model::SignificanceLevel;
use defmon_service::query::{
    distance, map_points, map_view, point_series, ColorKey, ColorMode, DateRange, MapStyle,
    OrbitFilter, QuerySession,
};
use defmon_service::{DefmonError, Inputs, MonitorContext};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const GEOLOCATION: &str = "pid,latitude,longitude,height\n\
                           P1,50.0,19.0,210.0\n\
                           P2,50.5,19.5,215.0\n";

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
}

/// Wide CSV with `days` daily rows; each point's value is produced by `f`.
fn wide_csv(pids: &[&str], days: usize, f: impl Fn(&str, usize) -> Option<f64>) -> String {
    let mut text = format!("Date,{}\n", pids.join(","));
    for i in 0..days {
        let date = start() + Duration::days(i as i64);
        let cells: Vec<String> = pids
            .iter()
            .map(|pid| f(pid, i).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        text.push_str(&format!("{},{}\n", date, cells.join(",")));
    }
    text
}

fn anomaly_csv(pid: &str, flags: &[bool]) -> String {
    let mut text = String::from("pid,predicted_value,upper_bound,lower_bound,is_anomaly\n");
    for (i, flag) in flags.iter().enumerate() {
        let p = i as f64;
        text.push_str(&format!(
            "{},{},{},{},{}\n",
            pid,
            p,
            p + 1.0,
            p - 1.0,
            u8::from(*flag)
        ));
    }
    text
}

fn inputs(displacement: &[(&str, String)], anomalies: Option<String>) -> Inputs {
    let geo = Table::parse_csv("geolocation.csv", GEOLOCATION).expect("geolocation parses");
    let mut inputs = Inputs {
        geolocation: vec![load_geolocation(&geo).expect("geolocation loads")],
        ..Inputs::default()
    };
    for (label, text) in displacement {
        let table = Table::parse_csv(label, text).expect("displacement parses");
        inputs
            .displacement
            .push(load_wide_series(&table, "Date", label).expect("displacement loads"));
    }
    if let Some(text) = anomalies {
        let table = Table::parse_csv("anomaly.csv", &text).expect("anomalies parse");
        inputs.anomalies.push(
            load_anomaly_records(&table, "Set 1", SignificanceLevel::P95, SignificanceLevel::P99)
                .expect("anomalies load"),
        );
    }
    inputs
}

fn build(inputs: Inputs, settings: AnalysisSettings) -> MonitorContext {
    MonitorContext::build(inputs, settings).expect("context builds")
}

// ---------------------------------------------------------------------------
// Fusion and velocity
// ---------------------------------------------------------------------------

#[test]
fn test_one_mm_per_day_is_365_mm_per_year() {
    let csv = wide_csv(&["P1"], 100, |_, i| Some(i as f64));
    let ctx = build(
        inputs(&[("Ascending 124", csv)], None),
        AnalysisSettings::default(),
    );

    let rows = ctx.fusion().for_point("P1");
    assert_eq!(rows.len(), 100);
    assert_eq!(rows[0].annualized_speed, None, "first sample has no predecessor");
    for row in &rows[1..] {
        let speed = row.annualized_speed.expect("speed defined on a one-day gap");
        assert!((speed - 365.0).abs() < 1e-9, "got {}", speed);
    }
    let mean = ctx.fusion().mean_velocity("P1").expect("mean velocity");
    assert!((mean - 365.0).abs() < 1e-9);
    assert!(rows.iter().all(|r| r.mean_velocity == Some(mean)));
}

#[test]
fn test_orbits_are_fused_into_one_time_ordered_series() {
    // Ascending on even days, descending on odd days.
    let asc = wide_csv(&["P1"], 10, |_, i| (i % 2 == 0).then_some(i as f64));
    let desc = wide_csv(&["P1"], 10, |_, i| (i % 2 == 1).then_some(i as f64));
    let ctx = build(
        inputs(&[("Ascending 124", asc), ("Descending 175", desc)], None),
        AnalysisSettings::default(),
    );

    let rows = ctx.fusion().for_point("P1");
    assert_eq!(rows.len(), 10);
    assert!(rows.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()));
    assert_eq!(rows[1].label(), "Descending 175");
    assert_eq!(rows[1].time_diff_days, Some(1));
    assert_eq!(ctx.summary().labels.len(), 2);
}

#[test]
fn test_points_without_geolocation_survive_fusion() {
    let csv = wide_csv(&["P1", "GHOST"], 3, |_, i| Some(i as f64));
    let ctx = build(
        inputs(&[("Ascending 124", csv)], None),
        AnalysisSettings::default(),
    );
    let ghost = ctx.fusion().for_point("GHOST");
    assert_eq!(ghost.len(), 3);
    assert!(ghost.iter().all(|r| r.geolocation.is_none()));
}

// ---------------------------------------------------------------------------
// Anomaly overlay
// ---------------------------------------------------------------------------

#[test]
fn test_sixty_records_cover_the_last_sixty_of_two_hundred_samples() {
    let csv = wide_csv(&["P1"], 200, |_, i| Some(i as f64 * 0.1));
    let mut flags = vec![false; 60];
    flags[56..].iter_mut().for_each(|f| *f = true);
    let ctx = build(
        inputs(&[("Ascending 124", csv)], Some(anomaly_csv("P1", &flags))),
        AnalysisSettings::default(),
    );

    let series = point_series(&ctx, "P1", &DateRange::all());
    assert_eq!(series.rows.len(), 200);
    assert!(series.rows[..140].iter().all(|r| r.overlay.is_none()));
    assert!(series.rows[140..].iter().all(|r| r.overlay.is_some()));

    let first = series.rows[140].overlay.as_ref().unwrap();
    assert_eq!(first.predicted_value, 0.0, "oldest record lands on row 140");
    let last = series.rows[199].overlay.as_ref().unwrap();
    let band = last.band(SignificanceLevel::P95).unwrap();
    assert!(band.is_anomaly);
    assert!(band.confirmed, "a run of 4 beats the threshold of 3");

    assert_eq!(
        ctx.anomalies().status("P1", ctx.fusion().for_point("P1")),
        AnomalyStatus::Confirmed
    );
}

#[test]
fn test_date_filter_does_not_shift_alignment() {
    let csv = wide_csv(&["P1"], 200, |_, i| Some(i as f64));
    let ctx = build(
        inputs(&[("Ascending 124", csv)], Some(anomaly_csv("P1", &[false; 60]))),
        AnalysisSettings::default(),
    );

    let from = start() + Duration::days(150);
    let to = start() + Duration::days(159);
    let series = point_series(&ctx, "P1", &DateRange::between(from, to));
    assert_eq!(series.rows.len(), 10);
    // Day 150 is observed row 150, which holds record 10.
    assert_eq!(series.rows[0].overlay.as_ref().unwrap().predicted_value, 10.0);
}

#[test]
fn test_short_run_is_flagged_but_not_confirmed() {
    let csv = wide_csv(&["P1"], 10, |_, i| Some(i as f64));
    let ctx = build(
        inputs(
            &[("Ascending 124", csv)],
            Some(anomaly_csv("P1", &[false, true, true, true, false])),
        ),
        AnalysisSettings::default(),
    );
    assert_eq!(
        ctx.anomalies().status("P1", ctx.fusion().for_point("P1")),
        AnomalyStatus::Flagged
    );
    assert_eq!(
        ctx.anomalies().status("P2", ctx.fusion().for_point("P2")),
        AnomalyStatus::NoData
    );
}

#[test]
fn test_residual_mode_builds_bands_from_predictions() {
    let csv = wide_csv(&["P1"], 30, |_, i| Some(if i == 29 { 100.0 } else { i as f64 }));
    let mut inputs = inputs(&[("Ascending 124", csv)], None);
    let mut predictions = String::from("P1\n");
    for step in 0..10 {
        // Forecasts track the observed trend with a small wobble.
        let wobble = if step % 2 == 0 { 0.5 } else { -0.5 };
        predictions.push_str(&format!("{}\n", (20 + step) as f64 + wobble));
    }
    let table = Table::parse_csv("predictions.csv", &predictions).unwrap();
    inputs
        .predictions
        .push(load_prediction_series(&table, "Ascending 124").unwrap());

    let settings = AnalysisSettings {
        band_mode: BandMode::Residual,
        ..AnalysisSettings::default()
    };
    let ctx = build(inputs, settings);
    let series = point_series(&ctx, "P1", &DateRange::all());

    assert!(series.rows[..20].iter().all(|r| r.overlay.is_none()));
    assert_eq!(series.levels, vec![SignificanceLevel::P95, SignificanceLevel::P99]);
    let last = series.rows[29].overlay.as_ref().unwrap();
    let p95 = last.band(SignificanceLevel::P95).unwrap();
    let p99 = last.band(SignificanceLevel::P99).unwrap();
    assert!(p99.upper_bound > p95.upper_bound, "99% band is wider");
    assert!(p95.is_anomaly, "the jump to 100 sits outside the band");
}

#[test]
fn test_prediction_gap_does_not_shift_forecast_dates() {
    let csv = wide_csv(&["P1", "P2"], 3, |pid, i| {
        Some(if pid == "P1" { [100.0, 7.0, 300.0][i] } else { i as f64 })
    });
    let mut inputs = inputs(&[("Ascending 124", csv)], None);
    let table = Table::parse_csv("predictions.csv", "P1,P2\n100.0,1\n,2\n300.0,3\n").unwrap();
    inputs
        .predictions
        .push(load_prediction_series(&table, "Ascending 124").unwrap());

    let settings = AnalysisSettings {
        band_mode: BandMode::Residual,
        ..AnalysisSettings::default()
    };
    let ctx = build(inputs, settings);
    let series = point_series(&ctx, "P1", &DateRange::all());
    let placed: Vec<Option<f64>> = series
        .rows
        .iter()
        .map(|r| r.overlay.as_ref().map(|o| o.predicted_value))
        .collect();
    assert_eq!(placed, vec![Some(100.0), None, Some(300.0)]);
}

#[test]
fn test_unflagged_99_band_is_judged_on_observed_value() {
    let csv = wide_csv(&["P1"], 2, |_, i| Some([10.0, 0.5][i]));
    let anomalies = "pid,predicted_value,upper_bound,lower_bound,is_anomaly,upper_bound_99,lower_bound_99\n\
                     P1,0.0,1.0,-1.0,1,2.0,-2.0\n\
                     P1,0.0,1.0,-1.0,0,2.0,-2.0\n";
    let ctx = build(
        inputs(&[("Ascending 124", csv)], Some(anomalies.to_string())),
        AnalysisSettings::default(),
    );

    let series = point_series(&ctx, "P1", &DateRange::all());
    let band99 = |i: usize| {
        *series.rows[i]
            .overlay
            .as_ref()
            .and_then(|o| o.band(SignificanceLevel::P99))
            .expect("99% band present")
    };
    assert!(band99(0).is_anomaly, "10.0 is outside [-2, 2]");
    assert!(!band99(1).is_anomaly, "0.5 is inside [-2, 2]");
}

#[test]
fn test_same_label_sources_sharing_a_date_fail_to_build() {
    let first = wide_csv(&["P1"], 3, |_, i| Some(i as f64));
    let second = wide_csv(&["P1"], 1, |_, _| Some(0.2));
    let result = MonitorContext::build(
        inputs(&[("Descending 175", first), ("Descending 175", second)], None),
        AnalysisSettings::default(),
    );
    assert!(matches!(result, Err(DefmonError::MalformedInput { .. })));
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn test_map_view_filters_by_orbit_and_lists_unplaced_points() {
    let asc = wide_csv(&["P1", "GHOST"], 5, |_, i| Some(i as f64));
    let desc = wide_csv(&["P2"], 5, |_, i| Some(-(i as f64)));
    let ctx = build(
        inputs(&[("Ascending 124", asc), ("Descending 175", desc)], None),
        AnalysisSettings::default(),
    );

    let view = map_view(
        &ctx,
        MapStyle::Dark,
        &OrbitFilter::only(["Ascending 124"]),
        ColorMode::Orbit,
    );
    let pids: Vec<_> = view.points.iter().map(|p| p.pid.as_str()).collect();
    assert_eq!(pids, vec!["P1"]);
    assert_eq!(view.missing_geolocation, vec!["GHOST".to_string()]);
    let viewport = view.viewport.expect("one plotted point gives a viewport");
    assert_eq!((viewport.center_lat, viewport.center_lon), (50.0, 19.0));
    assert_eq!(viewport.bounds.min_lat, 48.0);

    let everything = map_points(&ctx, &OrbitFilter::All, ColorMode::Speed);
    assert_eq!(everything.len(), 2);
    let p2 = everything.iter().find(|p| p.pid == "P2").unwrap();
    match &p2.color_key {
        ColorKey::Speed { mean_velocity, scaled } => {
            assert_eq!(*mean_velocity, Some(-365.0));
            assert_eq!(*scaled, Some(0.0), "clamped to the bottom of the scale");
        }
        other => panic!("unexpected colour key {:?}", other),
    }
}

#[test]
fn test_empty_orbit_selection_plots_nothing() {
    let csv = wide_csv(&["P1"], 3, |_, i| Some(i as f64));
    let ctx = build(
        inputs(&[("Ascending 124", csv)], None),
        AnalysisSettings::default(),
    );
    let view = map_view(
        &ctx,
        MapStyle::default(),
        &OrbitFilter::only(Vec::<String>::new()),
        ColorMode::Orbit,
    );
    assert!(view.points.is_empty());
    assert!(view.viewport.is_none());
}

#[test]
fn test_unknown_pid_gives_empty_series() {
    let csv = wide_csv(&["P1"], 3, |_, i| Some(i as f64));
    let ctx = build(
        inputs(&[("Ascending 124", csv)], None),
        AnalysisSettings::default(),
    );
    let series = point_series(&ctx, "NOPE", &DateRange::all());
    assert!(series.is_empty());
    assert!(series.point.is_none());
}

#[test]
fn test_distance_and_click_selection() {
    let csv = wide_csv(&["P1", "P2"], 3, |_, i| Some(i as f64));
    let ctx = build(
        inputs(&[("Ascending 124", csv)], None),
        AnalysisSettings::default(),
    );

    let d = distance(&ctx, "P1", "P2").expect("both points registered");
    assert_eq!(Some(d), distance(&ctx, "P2", "P1"));
    assert_eq!(distance(&ctx, "P1", "P1"), Some(0.0));
    assert_eq!(distance(&ctx, "P1", "NOPE"), None);

    let mut session = QuerySession::new();
    assert!(session.click(&ctx, "NOPE").is_empty(), "unregistered click is ignored");
    session.click(&ctx, "P1");
    assert!(!session.click(&ctx, "NOPE").is_complete());
    session.click(&ctx, "P2");
    assert_eq!(session.selection_distance(), Some(d));
    session.click(&ctx, "P1");
    assert!(session.selection().is_empty(), "third click clears");
}
