//! Run configuration shared by every subcommand.
//!
//! Each setting is a flag with an environment fallback; `main` reads a
//! `.env` file first so local overrides can live next to the data.

use crate::flows::{RECENT_QUARTERS, TOP_PAIRS};
use crate::smooth::DEFAULT_WINDOW;
use clap::Args;
use std::path::PathBuf;

/// Hosted map the dashboard links to. Not generated by this tool.
pub const DEFAULT_MAP_URL: &str = "https://qgiscloud.com/jaleas/Asker_sentrum_cloud/?l=Til%20Asker%20sentrum%20Morgen%2CFra%20Asker%20sentrum%20Ettermiddag!%2CGjennomfart%20Asker%20Syd-Nord%20uE18!%2CGjennomfart%20Asker%20Syd-Nord%20!%2CGjennomfart%20Asker%20Syd-Vest%20!%2CGjennomfart%20Asker%20Syd-Vest%20uE18!%2CKart%20over%20koer!%2CAsker%20sentrum%5B43%5D%2CSoner%20Syd%20Vest%20og%20Nord%5B78%5D!%2CGrey&t=Asker_sentrum_cloud&e=1148232%2C8344108%2C1180532%2C8368683";

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Congestion and bus delay observations
    #[arg(long, env = "MOBILITY_CONGESTION_CSV", default_value = "data/inndata_asker_ko.csv")]
    pub congestion_csv: PathBuf,

    /// Quarterly travel-mode counts
    #[arg(long, env = "MOBILITY_TRAVEL_MODES_CSV", default_value = "data/inndata_asker_reiser.csv")]
    pub travel_modes_csv: PathBuf,

    /// Zone-to-zone flow records
    #[arg(long, env = "MOBILITY_FLOWS_CSV", default_value = "data/inndata_asker_strommer.csv")]
    pub flows_csv: PathBuf,

    /// Moving-average window for smoothed date series
    #[arg(long, env = "MOBILITY_SMOOTHING_WINDOW", default_value_t = DEFAULT_WINDOW)]
    pub smoothing_window: usize,

    /// Number of most recent quarters included in flow summaries
    #[arg(long, env = "MOBILITY_RECENT_QUARTERS", default_value_t = RECENT_QUARTERS)]
    pub recent_quarters: usize,

    /// Number of origin/destination pairs kept in flow summaries
    #[arg(long, env = "MOBILITY_TOP_PAIRS", default_value_t = TOP_PAIRS)]
    pub top_pairs: usize,

    /// Link target for the map page
    #[arg(long, env = "MOBILITY_MAP_URL", default_value = DEFAULT_MAP_URL)]
    pub map_url: String,
}

impl Config {
    /// Configuration for the given input files with every other setting at
    /// its default.
    pub fn new(
        congestion_csv: impl Into<PathBuf>,
        travel_modes_csv: impl Into<PathBuf>,
        flows_csv: impl Into<PathBuf>,
    ) -> Self {
        Config {
            congestion_csv: congestion_csv.into(),
            travel_modes_csv: travel_modes_csv.into(),
            flows_csv: flows_csv.into(),
            smoothing_window: DEFAULT_WINDOW,
            recent_quarters: RECENT_QUARTERS,
            top_pairs: TOP_PAIRS,
            map_url: DEFAULT_MAP_URL.to_string(),
        }
    }
}
