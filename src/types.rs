use chrono::NaiveDate;
use serde::Deserialize;
use std::cmp::Ordering;
use std::fmt;
use tabled::Tabled;

/// Label of the synthetic group that spans every location.
pub const ALL_LOCATIONS: &str = "Alle strekninger";

/// Label used for "no zone restriction" in the flow views.
pub const ALL_ZONES: &str = "Alle soner";

/// Coarse time-of-day bucket used to partition congestion observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeOfDay {
    Morgen,
    Ettermiddag,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 2] = [TimeOfDay::Morgen, TimeOfDay::Ettermiddag];

    pub fn label(&self) -> &'static str {
        match self {
            TimeOfDay::Morgen => "Morgen",
            TimeOfDay::Ettermiddag => "Ettermiddag",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        TimeOfDay::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s))
    }
}

/// Grouping axis for congestion series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Date,
    ClockTime,
}

impl Axis {
    /// Suffix appended to lookup keys for this axis.
    pub fn key_suffix(&self) -> &'static str {
        match self {
            Axis::Date => "",
            Axis::ClockTime => "_klokkeslett",
        }
    }

    /// Column header used for the group labels in exports.
    pub fn label(&self) -> &'static str {
        match self {
            Axis::Date => "Dato",
            Axis::ClockTime => "Klokkeslett",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Congestion index, minutes per km.
    Congestion,
    /// Bus delay in minutes.
    Delay,
}

impl Metric {
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Congestion => "ko",
            Metric::Delay => "forsinkelser",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Congestion => "Kø (min/km)",
            Metric::Delay => "Forsinkelser (min)",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Metric::Congestion => "Kø",
            Metric::Delay => "Forsinkelser buss",
        }
    }
}

/// Calendar quarter. Ordered by the integer obtained from stripping every
/// separator out of the label, so `2023-4` sorts before `2024-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quarter {
    pub label: String,
    pub sort_key: u64,
}

impl Quarter {
    pub fn parse(s: &str) -> Option<Self> {
        let label = s.trim();
        let digits: String = label.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        let sort_key = digits.parse::<u64>().ok()?;
        Some(Quarter { label: label.to_string(), sort_key })
    }
}

impl Ord for Quarter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key
            .cmp(&other.sort_key)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl PartialOrd for Quarter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Fixed set of travel modes counted in the quarterly survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Car,
    Bus,
    Bike,
    Walk,
    Rail,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Car, Mode::Bus, Mode::Bike, Mode::Walk, Mode::Rail];

    /// Column name in the input file and key in the embedded JSON.
    pub fn column(&self) -> &'static str {
        match self {
            Mode::Car => "bil",
            Mode::Bus => "buss",
            Mode::Bike => "sykkel",
            Mode::Walk => "gange",
            Mode::Rail => "tog",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Car => "Bil",
            Mode::Bus => "Buss",
            Mode::Bike => "Sykkel",
            Mode::Walk => "Gange",
            Mode::Rail => "Tog",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Flows leaving the selected zones.
    From,
    /// Flows arriving in the selected zones.
    To,
}

impl Direction {
    pub fn key(&self) -> &'static str {
        match self {
            Direction::From => "fra",
            Direction::To => "til",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "from" | "fra" => Some(Direction::From),
            "to" | "til" => Some(Direction::To),
            _ => None,
        }
    }
}

// Raw rows. Headers are case-folded by the loader before deserializing, and
// alias columns are mapped to the first name of their group, so every rename
// here is that lowercase canonical name.

#[derive(Debug, Deserialize)]
pub struct RawCongestionRow {
    #[serde(rename = "dato")]
    pub date: Option<String>,
    #[serde(rename = "tid_dag")]
    pub bucket: Option<String>,
    #[serde(rename = "klokkeslett")]
    pub clock: Option<String>,
    #[serde(rename = "stop_name")]
    pub location: Option<String>,
    #[serde(rename = "ko_min_km")]
    pub congestion: Option<String>,
    #[serde(rename = "forsinkelser")]
    pub delay: Option<String>,
    #[serde(rename = "bil")]
    pub volume: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawTravelModeRow {
    #[serde(rename = "id")]
    pub route: Option<String>,
    #[serde(rename = "kvartal")]
    pub quarter: Option<String>,
    pub bil: Option<String>,
    pub buss: Option<String>,
    pub sykkel: Option<String>,
    pub gange: Option<String>,
    pub tog: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawFlowRow {
    #[serde(rename = "fra_sone")]
    pub origin: Option<String>,
    #[serde(rename = "til_sone")]
    pub destination: Option<String>,
    #[serde(rename = "kvartal")]
    pub quarter: Option<String>,
    #[serde(rename = "tid_dag")]
    pub time_of_day: Option<String>,
    #[serde(rename = "dagtype")]
    pub day_type: Option<String>,
    #[serde(rename = "antall_reiser")]
    pub trips: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CongestionRecord {
    pub date: NaiveDate,
    pub bucket: TimeOfDay,
    /// Zero-padded `HH:MM`.
    pub clock: String,
    /// Empty when the source row had no location.
    pub location: String,
    pub congestion: Option<f64>,
    pub delay: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeCounts {
    pub car: Option<f64>,
    pub bus: Option<f64>,
    pub bike: Option<f64>,
    pub walk: Option<f64>,
    pub rail: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TravelModeRecord {
    pub route: String,
    pub quarter: Quarter,
    pub counts: ModeCounts,
}

#[derive(Debug, Clone)]
pub struct FlowRecord {
    pub origin: String,
    pub destination: String,
    pub quarter: Quarter,
    pub time_of_day: String,
    pub day_type: String,
    pub trips: Option<f64>,
}

/// Ordered group labels with one nullable series per metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedSeries {
    pub labels: Vec<String>,
    pub congestion: Vec<Option<f64>>,
    pub delay: Vec<Option<f64>>,
}

impl AggregatedSeries {
    pub fn metric(&self, metric: Metric) -> &[Option<f64>] {
        match metric {
            Metric::Congestion => &self.congestion,
            Metric::Delay => &self.delay,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// One displayed series in the live congestion view.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSeries {
    pub location: String,
    pub series: AggregatedSeries,
}

// Console preview rows.

#[derive(Debug, Tabled, Clone)]
pub struct SeriesPreviewRow {
    #[tabled(rename = "Gruppe")]
    pub label: String,
    #[tabled(rename = "Strekning")]
    pub location: String,
    #[tabled(rename = "Verdi")]
    pub value: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct ModePreviewRow {
    #[tabled(rename = "Kvartal")]
    pub quarter: String,
    #[tabled(rename = "Bil")]
    pub car: String,
    #[tabled(rename = "Buss")]
    pub bus: String,
    #[tabled(rename = "Sykkel")]
    pub bike: String,
    #[tabled(rename = "Gange")]
    pub walk: String,
    #[tabled(rename = "Tog")]
    pub rail: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct FlowPreviewRow {
    #[tabled(rename = "Rang")]
    pub rank: usize,
    #[tabled(rename = "Fra")]
    pub origin: String,
    #[tabled(rename = "Til")]
    pub destination: String,
    #[tabled(rename = "Reiser")]
    pub trips: String,
}
