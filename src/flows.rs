//! Top-N origin/destination flow summaries for the flow diagram.

use crate::types::{Direction, FlowRecord, Quarter};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Number of most recent quarters a summary covers.
pub const RECENT_QUARTERS: usize = 4;
/// Maximum number of pairs in a summary.
pub const TOP_PAIRS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct FlowQuery {
    pub direction: Direction,
    /// Zones on the selected side of the flow. Empty means every zone.
    pub zones: Vec<String>,
    pub time_of_day: Option<String>,
    pub day_type: Option<String>,
    pub recent_quarters: usize,
    pub top_k: usize,
}

impl FlowQuery {
    pub fn new(direction: Direction, zones: Vec<String>) -> Self {
        FlowQuery {
            direction,
            zones,
            time_of_day: None,
            day_type: None,
            recent_quarters: RECENT_QUARTERS,
            top_k: TOP_PAIRS,
        }
    }

    fn matches(&self, r: &FlowRecord) -> bool {
        let zone = match self.direction {
            Direction::From => &r.origin,
            Direction::To => &r.destination,
        };
        let label_matches = |want: &Option<String>, have: &str| {
            want.as_deref().map_or(true, |w| w.eq_ignore_ascii_case(have))
        };
        (self.zones.is_empty() || self.zones.iter().any(|z| z == zone))
            && label_matches(&self.time_of_day, &r.time_of_day)
            && label_matches(&self.day_type, &r.day_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowPair {
    #[serde(rename = "fra")]
    pub origin: String,
    #[serde(rename = "til")]
    pub destination: String,
    #[serde(rename = "antall")]
    pub trips: f64,
}

/// Link between a left node (`source`) and a right node (`target`). Node
/// indices refer to [`FlowSummary::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowSummary {
    /// Ranked pairs, largest first.
    #[serde(rename = "par")]
    pub pairs: Vec<FlowPair>,
    /// Distinct origins among the pairs, in rank order.
    #[serde(rename = "kilder")]
    pub sources: Vec<String>,
    /// Distinct destinations among the pairs, in rank order.
    #[serde(rename = "mal")]
    pub targets: Vec<String>,
    /// Quarters the summary was restricted to, oldest first.
    #[serde(rename = "kvartaler")]
    pub quarters: Vec<String>,
}

impl FlowSummary {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Node labels for a two-column diagram: every source, then every
    /// target. A zone that is both appears once per column.
    pub fn nodes(&self) -> Vec<String> {
        self.sources.iter().chain(self.targets.iter()).cloned().collect()
    }

    pub fn links(&self) -> Vec<FlowLink> {
        let offset = self.sources.len();
        self.pairs
            .iter()
            .filter_map(|p| {
                let source = self.sources.iter().position(|s| s == &p.origin)?;
                let target = self.targets.iter().position(|t| t == &p.destination)?;
                Some(FlowLink {
                    source,
                    target: offset + target,
                    value: p.trips,
                })
            })
            .collect()
    }
}

/// The `n` most recent distinct quarters in chronological order.
pub fn recent_quarters(records: &[FlowRecord], n: usize) -> Vec<Quarter> {
    let all: BTreeSet<&Quarter> = records.iter().map(|r| &r.quarter).collect();
    let skip = all.len().saturating_sub(n);
    all.into_iter().skip(skip).cloned().collect()
}

/// Distinct zones appearing on either side of a flow, in name order.
pub fn zones(records: &[FlowRecord]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| [r.origin.clone(), r.destination.clone()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sum trips per (origin, destination) over the most recent quarters of the
/// whole record set, then keep the `top_k` largest pairs.
///
/// Ties keep the order in which the pairs were first encountered.
pub fn summarize_flows(records: &[FlowRecord], query: &FlowQuery) -> FlowSummary {
    let quarters = recent_quarters(records, query.recent_quarters);

    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut totals: Vec<FlowPair> = Vec::new();
    for r in records
        .iter()
        .filter(|r| quarters.contains(&r.quarter))
        .filter(|r| query.matches(r))
    {
        let key = (r.origin.as_str(), r.destination.as_str());
        let slot = *index.entry(key).or_insert_with(|| {
            totals.push(FlowPair {
                origin: r.origin.clone(),
                destination: r.destination.clone(),
                trips: 0.0,
            });
            totals.len() - 1
        });
        totals[slot].trips += r.trips.unwrap_or(0.0);
    }

    // `sort_by` is stable.
    totals.sort_by(|a, b| b.trips.total_cmp(&a.trips));
    totals.truncate(query.top_k);

    let mut sources: Vec<String> = Vec::new();
    let mut targets: Vec<String> = Vec::new();
    for p in &totals {
        if !sources.contains(&p.origin) {
            sources.push(p.origin.clone());
        }
        if !targets.contains(&p.destination) {
            targets.push(p.destination.clone());
        }
    }

    FlowSummary {
        pairs: totals,
        sources,
        targets,
        quarters: quarters.into_iter().map(|q| q.label).collect(),
    }
}
