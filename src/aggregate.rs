use crate::smooth::centered_moving_average;
use crate::types::{
    AggregatedSeries, Axis, CongestionRecord, LocationSeries, Mode, TimeOfDay, TravelModeRecord,
    ALL_LOCATIONS,
};
use crate::util::{format_date, median, round_opt};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Decimals kept for congestion and delay values.
pub const CONGESTION_DECIMALS: u32 = 3;
/// Decimals kept for travel-mode counts.
pub const MODE_DECIMALS: u32 = 2;

/// How a group of observations collapses to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Volume-weighted mean, used for the all-locations view.
    WeightedMean,
    /// Plain median, used for individual locations.
    Median,
}

/// Weighted mean over `(value, weight)` pairs.
///
/// Pairs with a missing value, a missing weight or a weight `<= 0` are
/// ignored. Returns `None` when nothing qualifies.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (Option<f64>, Option<f64>)>,
{
    let (num, den, n) = pairs
        .into_iter()
        .filter_map(|(v, w)| match (v, w) {
            (Some(v), Some(w)) if w > 0.0 => Some((v, w)),
            _ => None,
        })
        .fold((0.0, 0.0, 0usize), |(num, den, n), (v, w)| {
            (num + v * w, den + w, n + 1)
        });
    (n > 0).then(|| num / den)
}

/// Median of `value` per group. Every group that has rows appears in the
/// result, with `None` when none of its values are present.
pub fn grouped_median<T, K, FK, FV>(rows: &[T], key: FK, value: FV) -> BTreeMap<K, Option<f64>>
where
    K: Ord,
    FK: Fn(&T) -> K,
    FV: Fn(&T) -> Option<f64>,
{
    let mut groups: BTreeMap<K, Vec<Option<f64>>> = BTreeMap::new();
    for r in rows {
        groups.entry(key(r)).or_default().push(value(r));
    }
    groups.into_iter().map(|(k, vs)| (k, median(vs))).collect()
}

/// Weighted mean of `value` by `weight` per group.
pub fn grouped_weighted_mean<T, K, FK, FV, FW>(
    rows: &[T],
    key: FK,
    value: FV,
    weight: FW,
) -> BTreeMap<K, Option<f64>>
where
    K: Ord,
    FK: Fn(&T) -> K,
    FV: Fn(&T) -> Option<f64>,
    FW: Fn(&T) -> Option<f64>,
{
    let mut groups: BTreeMap<K, Vec<(Option<f64>, Option<f64>)>> = BTreeMap::new();
    for r in rows {
        groups.entry(key(r)).or_default().push((value(r), weight(r)));
    }
    groups
        .into_iter()
        .map(|(k, pairs)| (k, weighted_mean(pairs)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Date(NaiveDate),
    Clock(String),
}

impl GroupKey {
    fn of(record: &CongestionRecord, axis: Axis) -> Self {
        match axis {
            Axis::Date => GroupKey::Date(record.date),
            Axis::ClockTime => GroupKey::Clock(record.clock.clone()),
        }
    }

    fn label(&self) -> String {
        match self {
            GroupKey::Date(d) => format_date(*d),
            GroupKey::Clock(c) => c.clone(),
        }
    }
}

/// Group congestion rows along `axis` and reduce both metrics.
///
/// Labels come out in chronological (date) or clock (`HH:MM`) order no
/// matter how the input is ordered. Rows without a clock time are left out
/// of the clock axis.
pub fn aggregate_series(
    rows: &[&CongestionRecord],
    axis: Axis,
    reducer: Reducer,
) -> AggregatedSeries {
    let rows: Vec<&CongestionRecord> = rows
        .iter()
        .copied()
        .filter(|r| axis == Axis::Date || !r.clock.is_empty())
        .collect();
    let key = |r: &&CongestionRecord| GroupKey::of(r, axis);

    let (congestion, delay) = match reducer {
        Reducer::WeightedMean => (
            grouped_weighted_mean(&rows, key, |r| r.congestion, |r| r.volume),
            grouped_weighted_mean(&rows, key, |r| r.delay, |r| r.volume),
        ),
        Reducer::Median => (
            grouped_median(&rows, key, |r| r.congestion),
            grouped_median(&rows, key, |r| r.delay),
        ),
    };

    // Both maps are keyed by the same groups.
    AggregatedSeries {
        labels: congestion.keys().map(GroupKey::label).collect(),
        congestion: congestion.into_values().collect(),
        delay: delay.into_values().collect(),
    }
}

/// Lookup key used by the dashboard page, e.g. `Slemmestad_Morgen` or
/// `Slemmestad_Morgen_klokkeslett`.
pub fn lookup_key(location: &str, bucket: TimeOfDay, axis: Axis) -> String {
    format!("{}_{}{}", location, bucket.label(), axis.key_suffix())
}

/// Distinct non-empty locations in name order.
///
/// A location literally named "Alle strekninger" is left out, since that
/// name is reserved for the weighted all-locations series.
pub fn locations(records: &[CongestionRecord]) -> Vec<String> {
    let names: BTreeSet<&str> = records
        .iter()
        .map(|r| r.location.as_str())
        .filter(|l| !l.is_empty())
        .collect();
    if names.contains(ALL_LOCATIONS) {
        warn!(
            location = ALL_LOCATIONS,
            "Rows use the reserved all-locations name; not listed as a location"
        );
    }
    names
        .into_iter()
        .filter(|l| *l != ALL_LOCATIONS)
        .map(str::to_string)
        .collect()
}

/// One pre-aggregated entry of the embedded congestion lookup table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesEntry {
    #[serde(rename = "datoer", skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<String>>,
    #[serde(rename = "klokkeslett", skip_serializing_if = "Option::is_none")]
    pub clock_times: Option<Vec<String>>,
    #[serde(rename = "ko")]
    pub congestion: Vec<Option<f64>>,
    #[serde(rename = "forsinkelser")]
    pub delay: Vec<Option<f64>>,
    #[serde(rename = "ko_glattet", skip_serializing_if = "Option::is_none")]
    pub congestion_smoothed: Option<Vec<Option<f64>>>,
    #[serde(rename = "forsinkelser_glattet", skip_serializing_if = "Option::is_none")]
    pub delay_smoothed: Option<Vec<Option<f64>>>,
}

fn rounded(series: &[Option<f64>]) -> Vec<Option<f64>> {
    series
        .iter()
        .map(|v| round_opt(*v, CONGESTION_DECIMALS))
        .collect()
}

impl SeriesEntry {
    /// Round the series for embedding. Date series also carry a smoothed
    /// companion computed from the unrounded values.
    pub fn from_series(series: &AggregatedSeries, axis: Axis, window: usize) -> Self {
        let (dates, clock_times, congestion_smoothed, delay_smoothed) = match axis {
            Axis::Date => (
                Some(series.labels.clone()),
                None,
                Some(rounded(&centered_moving_average(&series.congestion, window))),
                Some(rounded(&centered_moving_average(&series.delay, window))),
            ),
            Axis::ClockTime => (None, Some(series.labels.clone()), None, None),
        };
        SeriesEntry {
            dates,
            clock_times,
            congestion: rounded(&series.congestion),
            delay: rounded(&series.delay),
            congestion_smoothed,
            delay_smoothed,
        }
    }
}

/// Pre-aggregate every (location, bucket, axis) combination the page can
/// ask for. "Alle strekninger" uses the volume-weighted mean; individual
/// locations use the median.
pub fn build_congestion_lookup(
    records: &[CongestionRecord],
    window: usize,
) -> BTreeMap<String, SeriesEntry> {
    let mut lookup = BTreeMap::new();
    let names = locations(records);

    for bucket in TimeOfDay::ALL {
        let rows: Vec<&CongestionRecord> = records.iter().filter(|r| r.bucket == bucket).collect();
        if rows.is_empty() {
            continue;
        }

        for axis in [Axis::Date, Axis::ClockTime] {
            let series = aggregate_series(&rows, axis, Reducer::WeightedMean);
            lookup.insert(
                lookup_key(ALL_LOCATIONS, bucket, axis),
                SeriesEntry::from_series(&series, axis, window),
            );
        }

        for name in &names {
            let at: Vec<&CongestionRecord> =
                rows.iter().copied().filter(|r| &r.location == name).collect();
            if at.is_empty() {
                continue;
            }
            for axis in [Axis::Date, Axis::ClockTime] {
                let series = aggregate_series(&at, axis, Reducer::Median);
                lookup.insert(
                    lookup_key(name, bucket, axis),
                    SeriesEntry::from_series(&series, axis, window),
                );
            }
        }
    }
    lookup
}

/// Filters for the live congestion view.
#[derive(Debug, Clone, PartialEq)]
pub struct CongestionFilter {
    pub bucket: TimeOfDay,
    pub axis: Axis,
    pub start_date: Option<NaiveDate>,
    /// Empty means "all locations".
    pub locations: Vec<String>,
}

impl CongestionFilter {
    pub fn new(bucket: TimeOfDay, axis: Axis) -> Self {
        CongestionFilter {
            bucket,
            axis,
            start_date: None,
            locations: Vec::new(),
        }
    }
}

/// Recompute the series shown for `filter`.
///
/// With no locations selected this is one volume-weighted "Alle strekninger"
/// series; otherwise one median series per selected location that has data.
/// Returns `None` when nothing survives the filter.
pub fn congestion_view(
    records: &[CongestionRecord],
    filter: &CongestionFilter,
) -> Option<Vec<LocationSeries>> {
    let rows: Vec<&CongestionRecord> = records
        .iter()
        .filter(|r| r.bucket == filter.bucket)
        .filter(|r| filter.start_date.map_or(true, |start| r.date >= start))
        .collect();

    let mut out = Vec::new();
    if filter.locations.is_empty() {
        let series = aggregate_series(&rows, filter.axis, Reducer::WeightedMean);
        if !series.is_empty() {
            out.push(LocationSeries {
                location: ALL_LOCATIONS.to_string(),
                series,
            });
        }
    } else {
        let mut seen = BTreeSet::new();
        for name in &filter.locations {
            if !seen.insert(name.as_str()) {
                continue;
            }
            let at: Vec<&CongestionRecord> =
                rows.iter().copied().filter(|r| &r.location == name).collect();
            let series = aggregate_series(&at, filter.axis, Reducer::Median);
            if !series.is_empty() {
                out.push(LocationSeries {
                    location: name.clone(),
                    series,
                });
            }
        }
    }

    (!out.is_empty()).then_some(out)
}

/// Quarter-ordered travel-mode counts for one route.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModeSeries {
    #[serde(rename = "kvartaler")]
    pub quarters: Vec<String>,
    #[serde(rename = "bil")]
    pub car: Vec<Option<f64>>,
    #[serde(rename = "buss")]
    pub bus: Vec<Option<f64>>,
    #[serde(rename = "sykkel")]
    pub bike: Vec<Option<f64>>,
    #[serde(rename = "gange")]
    pub walk: Vec<Option<f64>>,
    #[serde(rename = "tog")]
    pub rail: Vec<Option<f64>>,
}

impl ModeSeries {
    pub fn get(&self, mode: Mode) -> &[Option<f64>] {
        match mode {
            Mode::Car => &self.car,
            Mode::Bus => &self.bus,
            Mode::Bike => &self.bike,
            Mode::Walk => &self.walk,
            Mode::Rail => &self.rail,
        }
    }

    pub fn get_mut(&mut self, mode: Mode) -> &mut Vec<Option<f64>> {
        match mode {
            Mode::Car => &mut self.car,
            Mode::Bus => &mut self.bus,
            Mode::Bike => &mut self.bike,
            Mode::Walk => &mut self.walk,
            Mode::Rail => &mut self.rail,
        }
    }

    fn push(&mut self, record: &TravelModeRecord) {
        let c = &record.counts;
        self.quarters.push(record.quarter.label.clone());
        self.car.push(round_opt(c.car, MODE_DECIMALS));
        self.bus.push(round_opt(c.bus, MODE_DECIMALS));
        self.bike.push(round_opt(c.bike, MODE_DECIMALS));
        self.walk.push(round_opt(c.walk, MODE_DECIMALS));
        self.rail.push(round_opt(c.rail, MODE_DECIMALS));
    }
}

/// Distinct route ids in name order.
pub fn routes(records: &[TravelModeRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.route.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Mode series per route, each ordered by quarter.
pub fn build_mode_lookup(records: &[TravelModeRecord]) -> BTreeMap<String, ModeSeries> {
    let mut sorted: Vec<&TravelModeRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.quarter.cmp(&b.quarter));

    let mut lookup: BTreeMap<String, ModeSeries> = BTreeMap::new();
    for r in sorted {
        lookup.entry(r.route.clone()).or_default().push(r);
    }
    lookup
}

/// Mode series for a single route, or `None` if the route has no rows.
pub fn mode_view(records: &[TravelModeRecord], route: &str) -> Option<ModeSeries> {
    let rows: Vec<TravelModeRecord> = records.iter().filter(|r| r.route == route).cloned().collect();
    build_mode_lookup(&rows).remove(route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModeCounts, Quarter};

    fn rec(date: (i32, u32, u32), clock: &str, loc: &str, idx: Option<f64>, vol: Option<f64>) -> CongestionRecord {
        CongestionRecord {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            bucket: TimeOfDay::Morgen,
            clock: clock.to_string(),
            location: loc.to_string(),
            congestion: idx,
            delay: idx.map(|v| v * 2.0),
            volume: vol,
        }
    }

    #[test]
    fn weighted_mean_weights_by_volume() {
        let v = weighted_mean(vec![(Some(5.0), Some(10.0)), (Some(7.0), Some(30.0))]);
        assert!((v.unwrap() - 6.5).abs() < 1e-12);
    }

    #[test]
    fn unit_weights_give_plain_mean() {
        let values = [1.5, 4.0, 9.25, -3.0];
        let v = weighted_mean(values.iter().map(|x| (Some(*x), Some(1.0)))).unwrap();
        let plain = values.iter().sum::<f64>() / values.len() as f64;
        assert!((v - plain).abs() < 1e-12);
    }

    #[test]
    fn non_positive_weights_give_null() {
        assert_eq!(weighted_mean(vec![(Some(5.0), Some(0.0)), (Some(7.0), Some(-2.0))]), None);
        assert_eq!(weighted_mean(vec![(None, Some(3.0)), (Some(7.0), None)]), None);
        assert_eq!(weighted_mean(Vec::new()), None);
    }

    #[test]
    fn grouped_median_ignores_row_order() {
        let rows = vec![("a", Some(3.0)), ("b", Some(1.0)), ("a", Some(1.0)), ("a", None), ("b", Some(5.0)), ("a", Some(2.0))];
        let forward = grouped_median(&rows, |r| r.0, |r| r.1);
        let mut reversed = rows.clone();
        reversed.reverse();
        let backward = grouped_median(&reversed, |r| r.0, |r| r.1);
        assert_eq!(forward, backward);
        assert_eq!(forward["a"], Some(2.0));
        assert_eq!(forward["b"], Some(3.0));
    }

    #[test]
    fn grouped_median_keeps_empty_groups_as_null() {
        let rows = vec![("a", None), ("b", Some(1.0))];
        let out = grouped_median(&rows, |r| r.0, |r| r.1);
        assert_eq!(out["a"], None);
    }

    #[test]
    fn date_labels_are_chronological_not_input_order() {
        let records = vec![
            rec((2024, 2, 1), "07:00", "A", Some(1.0), Some(1.0)),
            rec((2023, 12, 31), "07:00", "A", Some(2.0), Some(1.0)),
            rec((2024, 1, 15), "07:00", "A", Some(3.0), Some(1.0)),
        ];
        let rows: Vec<&CongestionRecord> = records.iter().collect();
        let s = aggregate_series(&rows, Axis::Date, Reducer::Median);
        assert_eq!(s.labels, vec!["31.12.2023", "15.01.2024", "01.02.2024"]);
        assert_eq!(s.congestion, vec![Some(2.0), Some(3.0), Some(1.0)]);
    }

    #[test]
    fn clock_axis_orders_by_clock_and_skips_missing_times() {
        let records = vec![
            rec((2024, 1, 1), "08:15", "A", Some(1.0), Some(1.0)),
            rec((2024, 1, 1), "07:45", "A", Some(2.0), Some(1.0)),
            rec((2024, 1, 2), "", "A", Some(9.0), Some(1.0)),
        ];
        let rows: Vec<&CongestionRecord> = records.iter().collect();
        let s = aggregate_series(&rows, Axis::ClockTime, Reducer::WeightedMean);
        assert_eq!(s.labels, vec!["07:45", "08:15"]);
    }

    #[test]
    fn all_locations_weighted_but_single_location_median() {
        let records = vec![
            rec((2024, 1, 1), "07:00", "A", Some(5.0), Some(10.0)),
            rec((2024, 1, 1), "07:15", "A", Some(7.0), Some(30.0)),
        ];
        let lookup = build_congestion_lookup(&records, 5);

        let all = &lookup["Alle strekninger_Morgen"];
        assert_eq!(all.congestion, vec![Some(6.5)]);
        assert_eq!(all.dates.as_deref(), Some(&["01.01.2024".to_string()][..]));
        assert!(all.clock_times.is_none());

        let single = &lookup["A_Morgen"];
        assert_eq!(single.congestion, vec![Some(6.0)]);

        let by_clock = &lookup["A_Morgen_klokkeslett"];
        assert_eq!(by_clock.clock_times.as_ref().unwrap().len(), 2);
        assert!(by_clock.congestion_smoothed.is_none());
        assert!(!lookup.contains_key("A_Ettermiddag"));
    }

    #[test]
    fn reserved_location_name_does_not_replace_weighted_series() {
        let records = vec![
            rec((2024, 1, 1), "07:00", "A", Some(5.0), Some(10.0)),
            rec((2024, 1, 1), "07:00", "A", Some(7.0), Some(30.0)),
            rec((2024, 1, 1), "07:00", ALL_LOCATIONS, Some(100.0), None),
        ];
        assert_eq!(locations(&records), vec!["A"]);

        let lookup = build_congestion_lookup(&records, 5);
        // Row without volume carries no weight, so it does not move the mean.
        assert_eq!(lookup["Alle strekninger_Morgen"].congestion, vec![Some(6.5)]);
    }

    #[test]
    fn live_view_respects_selection_and_start_date() {
        let records = vec![
            rec((2024, 1, 1), "07:00", "A", Some(1.0), Some(1.0)),
            rec((2024, 1, 2), "07:00", "A", Some(2.0), Some(1.0)),
            rec((2024, 1, 2), "07:00", "B", Some(4.0), Some(1.0)),
        ];
        let mut filter = CongestionFilter::new(TimeOfDay::Morgen, Axis::Date);
        filter.start_date = NaiveDate::from_ymd_opt(2024, 1, 2);
        filter.locations = vec!["B".into(), "A".into(), "B".into()];

        let view = congestion_view(&records, &filter).unwrap();
        let names: Vec<&str> = view.iter().map(|s| s.location.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(view[1].series.labels, vec!["02.01.2024"]);
    }

    #[test]
    fn live_view_reports_no_data() {
        let records = vec![rec((2024, 1, 1), "07:00", "A", Some(1.0), Some(1.0))];
        let filter = CongestionFilter::new(TimeOfDay::Ettermiddag, Axis::Date);
        assert!(congestion_view(&records, &filter).is_none());

        let mut filter = CongestionFilter::new(TimeOfDay::Morgen, Axis::Date);
        filter.locations = vec!["Ukjent".into()];
        assert!(congestion_view(&records, &filter).is_none());
    }

    #[test]
    fn mode_lookup_orders_by_quarter_and_rounds() {
        let mk = |q: &str, car: f64| TravelModeRecord {
            route: "Til sentrum".into(),
            quarter: Quarter::parse(q).unwrap(),
            counts: ModeCounts { car: Some(car), ..Default::default() },
        };
        let records = vec![mk("2024-2", 1.005), mk("2023-4", 3.333), mk("2024-1", 2.0)];
        let lookup = build_mode_lookup(&records);
        let s = &lookup["Til sentrum"];
        assert_eq!(s.quarters, vec!["2023-4", "2024-1", "2024-2"]);
        assert_eq!(s.car[0], Some(3.33));
        assert_eq!(s.bus, vec![None, None, None]);
        assert_eq!(mode_view(&records, "Til sentrum").as_ref(), Some(s));
        assert!(mode_view(&records, "Fra sentrum").is_none());
    }
}
