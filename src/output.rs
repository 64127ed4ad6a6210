//! Exports and console previews.
//!
//! CSV exports follow the same locale rules as the inputs: UTF-8 with BOM,
//! `;` between fields and `,` as the decimal mark, so they open cleanly in a
//! Norwegian spreadsheet and load back through the same parser.

use crate::aggregate::{ModeSeries, CONGESTION_DECIMALS, MODE_DECIMALS};
use crate::flows::FlowSummary;
use crate::types::{
    Axis, FlowPreviewRow, LocationSeries, Metric, Mode, ModePreviewRow, SeriesPreviewRow,
};
use crate::util::{format_cell, format_decimal, normalize_header, parse_f64_safe, BOM};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};
use tracing::{debug, info};

/// Decimals used for flow trip counts in exports and previews.
const FLOW_DECIMALS: usize = 2;

fn locale_writer(path: &Path) -> Result<csv::Writer<File>> {
    let mut file =
        File::create(path).with_context(|| format!("could not create {}", path.display()))?;
    let mut bom = [0u8; 3];
    file.write_all(BOM.encode_utf8(&mut bom).as_bytes())?;
    Ok(WriterBuilder::new().delimiter(b';').from_writer(file))
}

/// Export the displayed congestion view for one metric.
///
/// Columns: group label (`Dato` or `Klokkeslett`), location, metric value
/// with three decimals. Gaps are written as empty cells.
pub fn write_series_csv(
    path: &Path,
    axis: Axis,
    metric: Metric,
    view: &[LocationSeries],
) -> Result<usize> {
    let mut wtr = locale_writer(path)?;
    wtr.write_record([axis.label(), "Strekning", metric.label()])?;
    let mut rows = 0usize;
    for s in view {
        for (label, value) in s.series.labels.iter().zip(s.series.metric(metric)) {
            let cell = format_cell(*value, CONGESTION_DECIMALS as usize);
            wtr.write_record([label.as_str(), s.location.as_str(), cell.as_str()])?;
            rows += 1;
        }
    }
    wtr.flush()?;
    info!(path = %path.display(), rows, "Exported congestion series");
    Ok(rows)
}

/// Export a route's travel-mode series with two decimals.
pub fn write_modes_csv(path: &Path, series: &ModeSeries) -> Result<usize> {
    let mut wtr = locale_writer(path)?;
    let mut header = vec!["Kvartal"];
    header.extend(Mode::ALL.iter().map(|m| m.label()));
    wtr.write_record(&header)?;
    for (i, quarter) in series.quarters.iter().enumerate() {
        let mut record = vec![quarter.clone()];
        record.extend(
            Mode::ALL
                .iter()
                .map(|m| format_cell(series.get(*m)[i], MODE_DECIMALS as usize)),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = series.quarters.len(), "Exported travel modes");
    Ok(series.quarters.len())
}

/// Export a ranked flow summary.
pub fn write_flows_csv(path: &Path, summary: &FlowSummary) -> Result<usize> {
    let mut wtr = locale_writer(path)?;
    wtr.write_record(["Rang", "Fra", "Til", "Reiser"])?;
    for (i, p) in summary.pairs.iter().enumerate() {
        wtr.write_record([
            (i + 1).to_string(),
            p.origin.clone(),
            p.destination.clone(),
            format_decimal(p.trips, FLOW_DECIMALS),
        ])?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = summary.pairs.len(), "Exported flows");
    Ok(summary.pairs.len())
}

/// One row read back from a series export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedRow {
    pub label: String,
    pub location: String,
    pub value: Option<f64>,
}

fn locale_reader(path: &Path) -> Result<(csv::Reader<File>, Vec<String>)> {
    let file = File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    let mut rdr = ReaderBuilder::new().delimiter(b';').from_reader(file);
    let headers: Vec<String> = rdr.headers()?.iter().map(normalize_header).collect();
    Ok((rdr, headers))
}

/// Read a series export back using the loader's number rules.
pub fn read_series_csv(path: &Path) -> Result<(Vec<String>, Vec<ExportedRow>)> {
    let (mut rdr, headers) = locale_reader(path)?;
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(ExportedRow {
            label: record.get(0).unwrap_or_default().to_string(),
            location: record.get(1).unwrap_or_default().to_string(),
            value: parse_f64_safe(record.get(2)),
        });
    }
    debug!(path = %path.display(), rows = rows.len(), "Read series export");
    Ok((headers, rows))
}

/// Read a travel-mode export back into a [`ModeSeries`]. Mode columns are
/// found by their header label, so column order does not matter.
pub fn read_modes_csv(path: &Path) -> Result<ModeSeries> {
    let (mut rdr, headers) = locale_reader(path)?;
    let quarter_col = headers
        .iter()
        .position(|h| h == "kvartal")
        .with_context(|| format!("{} has no Kvartal column", path.display()))?;
    let mut columns = Vec::new();
    for mode in Mode::ALL {
        let label = mode.label().to_lowercase();
        let col = headers
            .iter()
            .position(|h| *h == label)
            .with_context(|| format!("{} has no {} column", path.display(), mode.label()))?;
        columns.push((mode, col));
    }

    let mut series = ModeSeries::default();
    for result in rdr.records() {
        let record = result?;
        series
            .quarters
            .push(record.get(quarter_col).unwrap_or_default().to_string());
        for (mode, col) in &columns {
            series.get_mut(*mode).push(parse_f64_safe(record.get(*col)));
        }
    }
    debug!(path = %path.display(), rows = series.quarters.len(), "Read travel-mode export");
    Ok(series)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).with_context(|| format!("could not write {}", path.display()))?;
    Ok(())
}

pub fn series_preview(view: &[LocationSeries], metric: Metric) -> Vec<SeriesPreviewRow> {
    view.iter()
        .flat_map(|s| {
            s.series
                .labels
                .iter()
                .zip(s.series.metric(metric))
                .map(|(label, value)| SeriesPreviewRow {
                    label: label.clone(),
                    location: s.location.clone(),
                    value: value
                        .map(|v| format_decimal(v, CONGESTION_DECIMALS as usize))
                        .unwrap_or_else(|| "-".to_string()),
                })
        })
        .collect()
}

pub fn mode_preview(series: &ModeSeries) -> Vec<ModePreviewRow> {
    let cell = |v: Option<f64>| {
        v.map(|x| format_decimal(x, MODE_DECIMALS as usize))
            .unwrap_or_else(|| "-".to_string())
    };
    series
        .quarters
        .iter()
        .enumerate()
        .map(|(i, q)| ModePreviewRow {
            quarter: q.clone(),
            car: cell(series.car[i]),
            bus: cell(series.bus[i]),
            bike: cell(series.bike[i]),
            walk: cell(series.walk[i]),
            rail: cell(series.rail[i]),
        })
        .collect()
}

pub fn flow_preview(summary: &FlowSummary) -> Vec<FlowPreviewRow> {
    summary
        .pairs
        .iter()
        .enumerate()
        .map(|(i, p)| FlowPreviewRow {
            rank: i + 1,
            origin: p.origin.clone(),
            destination: p.destination.clone(),
            trips: format_decimal(p.trips, FLOW_DECIMALS),
        })
        .collect()
}

/// Print up to `max_rows` rows as a markdown table.
pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(ingen rader)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}", table_str);
    if rows.len() > max_rows {
        println!("... {} rader til", rows.len() - max_rows);
    }
    println!();
}
