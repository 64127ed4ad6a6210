use crate::error::{LoadError, Result};
use crate::types::{
    CongestionRecord, FlowRecord, ModeCounts, Quarter, RawCongestionRow, RawFlowRow,
    RawTravelModeRow, TimeOfDay, TravelModeRecord,
};
use crate::util::{normalize_clock, normalize_header, parse_date, parse_f64_safe};
use csv::{ReaderBuilder, StringRecord};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

/// Required columns per table. Inner slices list accepted aliases; the
/// first name is the one reported when the column is absent.
const CONGESTION_COLUMNS: &[&[&str]] = &[
    &["dato"],
    &["tid_dag", "tid"],
    &["klokkeslett"],
    &["stop_name"],
    &["ko_min_km"],
    &["forsinkelser"],
    &["bil"],
];

const TRAVEL_MODE_COLUMNS: &[&[&str]] = &[
    &["id"],
    &["kvartal"],
    &["bil"],
    &["buss"],
    &["sykkel"],
    &["gange"],
    &["tog"],
];

const FLOW_COLUMNS: &[&[&str]] = &[
    &["fra_sone"],
    &["til_sone"],
    &["kvartal"],
    &["tid_dag"],
    &["dagtype"],
    &["antall_reiser"],
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub skipped_rows: usize,
    pub null_cells: usize,
}

/// Open a `;`-separated table, normalize its header row and verify that
/// every required column is present.
fn open_table(path: &Path, required: &[&[&str]]) -> Result<(csv::Reader<File>, StringRecord)> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(file);
    let mut names: Vec<String> = rdr
        .headers()
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(normalize_header)
        .collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|aliases| resolve_alias(&mut names, aliases).is_none())
        .map(|aliases| aliases[0].to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }
    debug!(path = %path.display(), columns = names.len(), "Header accepted");
    Ok((rdr, names.into_iter().collect()))
}

/// Pick the column for one alias group and give it the group's first name.
///
/// Aliases are tried in order, so when several are present the earliest one
/// wins and the others stay under their own names, which the raw row types
/// do not read.
fn resolve_alias(names: &mut [String], aliases: &[&str]) -> Option<usize> {
    let idx = aliases
        .iter()
        .find_map(|a| names.iter().position(|h| h == a))?;
    if names[idx] != aliases[0] {
        debug!(from = %names[idx], to = aliases[0], "Column alias applied");
        names[idx] = aliases[0].to_string();
    }
    Some(idx)
}

/// Deserialize every data row of a table, handing each to `f` with its
/// 1-based line number.
fn for_each_row<T, F>(path: &Path, required: &[&[&str]], mut f: F) -> Result<usize>
where
    T: DeserializeOwned,
    F: FnMut(T, u64) -> Result<()>,
{
    let (mut rdr, headers) = open_table(path, required)?;
    let mut total = 0usize;
    for result in rdr.records() {
        let record = result.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: T = record
            .deserialize(Some(&headers))
            .map_err(|source| LoadError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        total += 1;
        f(row, line)?;
    }
    Ok(total)
}

/// Parse a numeric cell, counting cells that were present but unreadable.
fn numeric(cell: Option<&str>, null_cells: &mut usize) -> Option<f64> {
    let v = parse_f64_safe(cell);
    if v.is_none() && cell.map(|c| !c.trim().is_empty()).unwrap_or(false) {
        *null_cells += 1;
    }
    v
}

fn trimmed(cell: Option<String>) -> String {
    cell.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn quarter_cell(path: &Path, line: u64, cell: Option<&str>) -> Result<Quarter> {
    let value = cell.unwrap_or_default();
    Quarter::parse(value).ok_or_else(|| LoadError::BadQuarter {
        path: path.to_path_buf(),
        line,
        value: value.to_string(),
    })
}

fn log_report(table: &str, path: &Path, report: &LoadReport) {
    info!(
        table,
        path = %path.display(),
        total = report.total_rows,
        kept = report.kept_rows,
        skipped = report.skipped_rows,
        null_cells = report.null_cells,
        "Loaded table"
    );
    if report.skipped_rows > 0 {
        warn!(table, skipped = report.skipped_rows, "Rows skipped during load");
    }
}

/// Load congestion and delay observations.
///
/// Unparseable dates abort the load; rows outside the two known
/// time-of-day buckets are skipped.
pub fn load_congestion(path: &Path) -> Result<(Vec<CongestionRecord>, LoadReport)> {
    let mut report = LoadReport::default();
    let mut records = Vec::new();

    let total = for_each_row(path, CONGESTION_COLUMNS, |row: RawCongestionRow, line| {
        let raw_date = row.date.unwrap_or_default();
        let date = parse_date(&raw_date).ok_or_else(|| LoadError::BadDate {
            path: path.to_path_buf(),
            line,
            value: raw_date.clone(),
        })?;
        let Some(bucket) = row.bucket.as_deref().and_then(TimeOfDay::parse) else {
            debug!(line, bucket = ?row.bucket, "Unknown time-of-day bucket");
            report.skipped_rows += 1;
            return Ok(());
        };
        records.push(CongestionRecord {
            date,
            bucket,
            clock: row.clock.as_deref().map(normalize_clock).unwrap_or_default(),
            location: trimmed(row.location),
            congestion: numeric(row.congestion.as_deref(), &mut report.null_cells),
            delay: numeric(row.delay.as_deref(), &mut report.null_cells),
            volume: numeric(row.volume.as_deref(), &mut report.null_cells),
        });
        Ok(())
    })?;

    report.total_rows = total;
    report.kept_rows = records.len();
    log_report("congestion", path, &report);
    Ok((records, report))
}

/// Load quarterly travel-mode counts. Records are returned sorted by
/// quarter; rows without a route id are skipped.
pub fn load_travel_modes(path: &Path) -> Result<(Vec<TravelModeRecord>, LoadReport)> {
    let mut report = LoadReport::default();
    let mut records = Vec::new();

    let total = for_each_row(path, TRAVEL_MODE_COLUMNS, |row: RawTravelModeRow, line| {
        let quarter = quarter_cell(path, line, row.quarter.as_deref())?;
        let route = trimmed(row.route);
        if route.is_empty() {
            report.skipped_rows += 1;
            return Ok(());
        }
        let n = &mut report.null_cells;
        let counts = ModeCounts {
            car: numeric(row.bil.as_deref(), n),
            bus: numeric(row.buss.as_deref(), n),
            bike: numeric(row.sykkel.as_deref(), n),
            walk: numeric(row.gange.as_deref(), n),
            rail: numeric(row.tog.as_deref(), n),
        };
        records.push(TravelModeRecord {
            route,
            quarter,
            counts,
        });
        Ok(())
    })?;
    report.total_rows = total;

    // Stable, so rows sharing a quarter keep file order.
    records.sort_by(|a, b| a.quarter.cmp(&b.quarter));
    report.kept_rows = records.len();
    log_report("travel_modes", path, &report);
    Ok((records, report))
}

/// Load zone-to-zone flow records. Rows missing either zone are skipped.
pub fn load_flows(path: &Path) -> Result<(Vec<FlowRecord>, LoadReport)> {
    let mut report = LoadReport::default();
    let mut records = Vec::new();

    let total = for_each_row(path, FLOW_COLUMNS, |row: RawFlowRow, line| {
        let quarter = quarter_cell(path, line, row.quarter.as_deref())?;
        let origin = trimmed(row.origin);
        let destination = trimmed(row.destination);
        if origin.is_empty() || destination.is_empty() {
            report.skipped_rows += 1;
            return Ok(());
        }
        records.push(FlowRecord {
            origin,
            destination,
            quarter,
            time_of_day: trimmed(row.time_of_day),
            day_type: trimmed(row.day_type),
            trips: numeric(row.trips.as_deref(), &mut report.null_cells),
        });
        Ok(())
    })?;

    report.total_rows = total;
    report.kept_rows = records.len();
    log_report("flows", path, &report);
    Ok((records, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("mobility_report_loader_{}", name));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_congestion_with_bom_and_locale() {
        let path = temp_file(
            "ko_ok.csv",
            "\u{feff}Dato ;TID_DAG;Klokkeslett;stop_name;ko_min_km;forsinkelser;bil\n\
             16,10,2025;Morgen;7:15;Slemmestad;1,25;0,5;120\n\
             2025-10-17;Ettermiddag;16:00;Slemmestad;abc;;80\n",
        );
        let (records, report) = load_congestion(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.null_cells, 1);

        let first = &records[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 10, 16).unwrap());
        assert_eq!(first.bucket, TimeOfDay::Morgen);
        assert_eq!(first.clock, "07:15");
        assert_eq!(first.congestion, Some(1.25));
        assert_eq!(first.volume, Some(120.0));

        assert_eq!(records[1].congestion, None);
        assert_eq!(records[1].delay, None);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_congestion_accepts_tid_alias_and_skips_unknown_bucket() {
        let path = temp_file(
            "ko_alias.csv",
            "dato;tid;klokkeslett;stop_name;ko_min_km;forsinkelser;bil\n\
             2025-10-16;Morgen;07:00;A;1;1;1\n\
             2025-10-16;Natt;02:00;A;1;1;1\n",
        );
        let (records, report) = load_congestion(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(report.skipped_rows, 1);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_congestion_with_both_tid_and_tid_dag_prefers_tid_dag() {
        let path = temp_file(
            "ko_both_tid.csv",
            "dato;tid;tid_dag;klokkeslett;stop_name;ko_min_km;forsinkelser;bil\n\
             2025-10-16;Ettermiddag;Morgen;07:00;A;1;1;1\n\
             2025-10-16;Morgen;Ettermiddag;16:00;A;2;1;1\n",
        );
        let (records, report) = load_congestion(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(report.skipped_rows, 0);
        assert_eq!(records[0].bucket, TimeOfDay::Morgen);
        assert_eq!(records[1].bucket, TimeOfDay::Ettermiddag);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_alias_resolution_keeps_other_columns() {
        let mut names: Vec<String> = ["dato", "tid", "bil"].iter().map(|s| s.to_string()).collect();
        assert_eq!(resolve_alias(&mut names, &["tid_dag", "tid"]), Some(1));
        assert_eq!(names, vec!["dato", "tid_dag", "bil"]);
        assert_eq!(resolve_alias(&mut names, &["klokkeslett"]), None);
    }

    #[test]
    fn test_bad_date_is_fatal() {
        let path = temp_file(
            "ko_bad_date.csv",
            "dato;tid_dag;klokkeslett;stop_name;ko_min_km;forsinkelser;bil\n\
             2025-10-16;Morgen;07:00;A;1;1;1\n\
             16/10/2025;Morgen;07:00;A;1;1;1\n",
        );
        let err = load_congestion(&path).unwrap_err();
        match err {
            LoadError::BadDate { line, value, .. } => {
                assert_eq!(line, 3);
                assert_eq!(value, "16/10/2025");
            }
            other => panic!("unexpected error: {other}"),
        }
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_columns_are_reported() {
        let path = temp_file("ko_missing.csv", "dato;stop_name\n2025-10-16;A\n");
        let err = load_congestion(&path).unwrap_err();
        match err {
            LoadError::MissingColumns { missing, .. } => {
                assert!(missing.contains(&"tid_dag".to_string()));
                assert!(missing.contains(&"bil".to_string()));
                assert!(!missing.contains(&"dato".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let path = env::temp_dir().join("mobility_report_loader_does_not_exist.csv");
        let err = load_flows(&path).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("does_not_exist"));
    }

    #[test]
    fn test_travel_modes_sorted_by_quarter() {
        let path = temp_file(
            "reiser.csv",
            "ID;kvartal;bil;buss;sykkel;gange;tog\n\
             Til sentrum;2024-1;10,5;2;1;3;4\n\
             Til sentrum;2023-4;9;2;1;3;x\n",
        );
        let (records, _) = load_travel_modes(&path).unwrap();
        assert_eq!(records[0].quarter.label, "2023-4");
        assert_eq!(records[0].counts.rail, None);
        assert_eq!(records[1].counts.car, Some(10.5));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bad_quarter_is_fatal() {
        let path = temp_file(
            "strommer_bad.csv",
            "fra_sone;til_sone;kvartal;tid_dag;dagtype;antall_reiser\n\
             A;B;ukjent;Morgen;Virkedag;10\n",
        );
        assert!(matches!(
            load_flows(&path).unwrap_err(),
            LoadError::BadQuarter { .. }
        ));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_flows_skips_rows_without_zones() {
        let path = temp_file(
            "strommer.csv",
            "fra_sone;til_sone;kvartal;tid_dag;dagtype;antall_reiser\n\
             A;B;2024-1;Morgen;Virkedag;10,5\n\
             ;B;2024-1;Morgen;Virkedag;3\n",
        );
        let (records, report) = load_flows(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(report.skipped_rows, 1);
        assert_eq!(records[0].trips, Some(10.5));
        fs::remove_file(&path).unwrap();
    }
}
