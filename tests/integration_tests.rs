use mobility_report::aggregate::{congestion_view, CongestionFilter};
use mobility_report::config::Config;
use mobility_report::dashboard;
use mobility_report::flows::{summarize_flows, FlowQuery};
use mobility_report::output::{read_series_csv, write_series_csv};
use mobility_report::store::DataStore;
use mobility_report::types::{Axis, Direction, Metric, TimeOfDay};
use std::env;
use std::fs;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn store() -> DataStore {
    DataStore::new(Config::new(
        fixture("inndata_ko.csv"),
        fixture("inndata_reiser.csv"),
        fixture("inndata_strommer.csv"),
    ))
}

#[test]
fn test_generate_writes_page_and_lookup_tables() {
    let out_dir = env::temp_dir().join("mobility_report_it_generate");
    let _ = fs::remove_dir_all(&out_dir);

    let summary = dashboard::generate(&store(), &out_dir).expect("generate failed");
    assert!(summary.html_path.exists());
    assert!(summary.html_bytes > 0);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary.json_path).unwrap()).unwrap();

    let all = &json["ko"]["Alle strekninger_Morgen"];
    assert_eq!(all["datoer"], serde_json::json!(["01.01.2024", "02.01.2024"]));
    assert_eq!(all["ko"], serde_json::json!([6.5, 4.5]));

    let single = &json["ko"]["Slemmestadveien_Morgen"];
    assert_eq!(single["ko"], serde_json::json!([6.0, 4.5]));

    let by_clock = &json["ko"]["Slemmestadveien_Morgen_klokkeslett"];
    assert_eq!(by_clock["klokkeslett"], serde_json::json!(["07:00", "07:15"]));

    // Unparseable cell becomes a gap, not zero.
    let evening = &json["ko"]["Alle strekninger_Ettermiddag"];
    assert_eq!(evening["ko"][1], serde_json::Value::Null);

    let route = &json["reiser"]["Til Asker sentrum"];
    assert_eq!(route["kvartaler"], serde_json::json!(["2023-4", "2024-2"]));
    assert_eq!(route["bil"][1], 120.46);

    let to_z = &json["strom_sammendrag"]["til_Z"];
    assert_eq!(to_z["kilder"], serde_json::json!(["A", "B", "C"]));

    let html = fs::read_to_string(&summary.html_path).unwrap();
    assert!(html.contains("Slemmestadveien_Morgen_klokkeslett"));

    fs::remove_dir_all(&out_dir).unwrap();
}

#[test]
fn test_flow_scenario_over_last_four_quarters() {
    let store = store();
    let flows = store.flows().unwrap();
    let summary = summarize_flows(flows, &FlowQuery::new(Direction::To, vec!["Z".into()]));

    let pairs: Vec<(&str, &str, f64)> = summary
        .pairs
        .iter()
        .map(|p| (p.origin.as_str(), p.destination.as_str(), p.trips))
        .collect();
    assert_eq!(pairs, vec![("A", "Z", 100.0), ("B", "Z", 50.0), ("C", "Z", 10.0)]);
    assert_eq!(summary.quarters, vec!["2023-2", "2023-3", "2023-4", "2024-1"]);
}

#[test]
fn test_live_view_export_round_trip() {
    let store = store();
    let records = store.congestion().unwrap();
    let mut filter = CongestionFilter::new(TimeOfDay::Morgen, Axis::Date);
    filter.locations = vec!["Slemmestadveien".into(), "Drammensveien".into()];
    let view = congestion_view(records, &filter).unwrap();
    assert_eq!(view.len(), 2);

    let path = env::temp_dir().join("mobility_report_it_export.csv");
    write_series_csv(&path, Axis::Date, Metric::Delay, &view).unwrap();
    let (_, rows) = read_series_csv(&path).unwrap();

    let expected: Vec<Option<f64>> = view
        .iter()
        .flat_map(|s| s.series.delay.iter().copied())
        .collect();
    assert_eq!(rows.len(), expected.len());
    for (row, want) in rows.iter().zip(expected) {
        match (row.value, want) {
            (Some(a), Some(b)) => assert!((a - b).abs() <= 0.0005),
            (None, None) => {}
            other => panic!("mismatch for {}: {:?}", row.label, other),
        }
    }
    fs::remove_file(&path).unwrap();
}

#[test]
fn test_missing_source_file_writes_nothing() {
    let out_dir = env::temp_dir().join("mobility_report_it_missing");
    let _ = fs::remove_dir_all(&out_dir);
    let store = DataStore::new(Config::new(
        fixture("inndata_ko.csv"),
        fixture("finnes_ikke.csv"),
        fixture("inndata_strommer.csv"),
    ));

    let err = dashboard::generate(&store, &out_dir).unwrap_err();
    assert!(err.to_string().contains("finnes_ikke.csv"));
    assert!(!out_dir.exists());
}
