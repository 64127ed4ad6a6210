//! Centered moving average over nullable series.

/// Window used for the smoothed date series on the dashboard.
pub const DEFAULT_WINDOW: usize = 5;

/// Average each point with its `window / 2` neighbours on either side.
///
/// The window is clipped at the series bounds and null entries are skipped.
/// A point whose whole sub-window is null stays null.
pub fn centered_moving_average(series: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let half = window / 2;
    (0..series.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(series.len() - 1);
            let (sum, count) = series[lo..=hi]
                .iter()
                .flatten()
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}
