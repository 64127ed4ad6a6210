//! Static dashboard generation.
//!
//! Everything the page can display is aggregated here, once, and embedded as
//! a JSON blob. The in-page script only looks entries up by key.

use crate::aggregate::{
    build_congestion_lookup, build_mode_lookup, locations, routes, ModeSeries, SeriesEntry,
};
use crate::config::Config;
use crate::flows::{recent_quarters, summarize_flows, zones, FlowLink, FlowQuery, FlowSummary};
use crate::output::write_json;
use crate::store::DataStore;
use crate::types::{
    CongestionRecord, Direction, FlowRecord, Mode, TravelModeRecord, ALL_LOCATIONS, ALL_ZONES,
};
use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TEMPLATE: &str = include_str!("../templates/dashboard.html");
const DATA_PLACEHOLDER: &str = "/*__DASHBOARD_DATA__*/null";
const GENERATED_PLACEHOLDER: &str = "__GENERATED_AT__";

#[derive(Debug, Clone, Serialize)]
pub struct ModeInfo {
    pub key: &'static str,
    pub label: &'static str,
}

/// A flow summary with its diagram nodes and links resolved.
#[derive(Debug, Clone, Serialize)]
pub struct FlowDiagram {
    #[serde(flatten)]
    pub summary: FlowSummary,
    #[serde(rename = "noder")]
    pub nodes: Vec<String>,
    #[serde(rename = "lenker")]
    pub links: Vec<FlowLink>,
}

impl From<FlowSummary> for FlowDiagram {
    fn from(summary: FlowSummary) -> Self {
        FlowDiagram {
            nodes: summary.nodes(),
            links: summary.links(),
            summary,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    #[serde(rename = "generert")]
    pub generated_at: String,
    /// "Alle strekninger" first, then every location.
    #[serde(rename = "strekninger")]
    pub locations: Vec<String>,
    #[serde(rename = "ko")]
    pub congestion: BTreeMap<String, SeriesEntry>,
    #[serde(rename = "ruter")]
    pub routes: Vec<String>,
    #[serde(rename = "reiser")]
    pub travel_modes: BTreeMap<String, ModeSeries>,
    #[serde(rename = "transportmidler")]
    pub modes: Vec<ModeInfo>,
    #[serde(rename = "soner")]
    pub zones: Vec<String>,
    #[serde(rename = "kvartaler")]
    pub flow_quarters: Vec<String>,
    /// Keyed `"<fra|til>_<zone>"`, plus `"<fra|til>_Alle soner"`.
    #[serde(rename = "strom_sammendrag")]
    pub flow_summaries: BTreeMap<String, FlowDiagram>,
    #[serde(rename = "kart_url")]
    pub map_url: String,
}

pub fn flow_key(direction: Direction, zone: &str) -> String {
    format!("{}_{}", direction.key(), zone)
}

/// Pre-compute the flow summary for "all zones" and for every single zone,
/// in both directions. Empty summaries are left out.
pub fn build_flow_summaries(
    records: &[FlowRecord],
    config: &Config,
) -> BTreeMap<String, FlowDiagram> {
    let mut out = BTreeMap::new();
    let all_zones = zones(records);
    for direction in [Direction::From, Direction::To] {
        let selections = std::iter::once((ALL_ZONES.to_string(), Vec::new()))
            .chain(all_zones.iter().map(|z| (z.clone(), vec![z.clone()])));
        for (label, selected) in selections {
            let mut query = FlowQuery::new(direction, selected);
            query.recent_quarters = config.recent_quarters;
            query.top_k = config.top_pairs;
            let summary = summarize_flows(records, &query);
            if summary.is_empty() {
                continue;
            }
            out.insert(flow_key(direction, &label), FlowDiagram::from(summary));
        }
    }
    out
}

pub fn build(
    congestion: &[CongestionRecord],
    travel_modes: &[TravelModeRecord],
    flows: &[FlowRecord],
    config: &Config,
) -> DashboardData {
    let mut location_options = vec![ALL_LOCATIONS.to_string()];
    location_options.extend(locations(congestion));

    DashboardData {
        generated_at: Local::now().format("%d.%m.%Y %H:%M").to_string(),
        locations: location_options,
        congestion: build_congestion_lookup(congestion, config.smoothing_window),
        routes: routes(travel_modes),
        travel_modes: build_mode_lookup(travel_modes),
        modes: Mode::ALL
            .iter()
            .map(|m| ModeInfo {
                key: m.column(),
                label: m.label(),
            })
            .collect(),
        zones: zones(flows),
        flow_quarters: recent_quarters(flows, config.recent_quarters)
            .into_iter()
            .map(|q| q.label)
            .collect(),
        flow_summaries: build_flow_summaries(flows, config),
        map_url: config.map_url.clone(),
    }
}

/// Serialize `data` for embedding in a `<script>` element.
pub fn embed_json(data: &DashboardData) -> Result<String> {
    // `<\/` is an ordinary JSON escape and keeps `</script>` out of the page.
    Ok(serde_json::to_string(data)?.replace("</", "<\\/"))
}

pub fn render_html(data: &DashboardData) -> Result<String> {
    // Timestamp first, so placeholder text inside the data is left alone.
    let blob = embed_json(data)?;
    Ok(TEMPLATE
        .replace(GENERATED_PLACEHOLDER, &data.generated_at)
        .replace(DATA_PLACEHOLDER, &blob))
}

#[derive(Debug, Clone)]
pub struct GenerateSummary {
    pub html_path: PathBuf,
    pub json_path: PathBuf,
    pub congestion_entries: usize,
    pub routes: usize,
    pub flow_summaries: usize,
    pub html_bytes: usize,
}

/// Load every table, aggregate, and write `index.html` and `dashboard.json`
/// into `out_dir`. Nothing is written if any table fails to load.
pub fn generate(store: &DataStore, out_dir: &Path) -> Result<GenerateSummary> {
    let congestion = store.congestion()?;
    let travel_modes = store.travel_modes()?;
    let flows = store.flows()?;

    let data = build(congestion, travel_modes, flows, store.config());
    debug!(
        keys = ?data.congestion.keys().take(5).collect::<Vec<_>>(),
        "Sample congestion keys"
    );
    let html = render_html(&data)?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("could not create output directory {}", out_dir.display()))?;
    let html_path = out_dir.join("index.html");
    let json_path = out_dir.join("dashboard.json");
    fs::write(&html_path, &html)
        .with_context(|| format!("could not write {}", html_path.display()))?;
    write_json(&json_path, &data)?;

    let summary = GenerateSummary {
        html_path,
        json_path,
        congestion_entries: data.congestion.len(),
        routes: data.travel_modes.len(),
        flow_summaries: data.flow_summaries.len(),
        html_bytes: html.len(),
    };
    info!(
        path = %summary.html_path.display(),
        entries = summary.congestion_entries,
        routes = summary.routes,
        flow_summaries = summary.flow_summaries,
        bytes = summary.html_bytes,
        "Dashboard written"
    );
    Ok(summary)
}
