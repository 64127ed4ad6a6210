//! Read-only access to the loaded tables.
//!
//! A [`DataStore`] is built once at startup and handed to whichever view
//! needs data. Each table is loaded on first use and kept for the rest of the
//! run; the source files are not expected to change underneath it. A failed
//! load is returned to the caller and retried on the next access.

use crate::config::Config;
use crate::error::LoadError;
use crate::loader;
use crate::types::{CongestionRecord, FlowRecord, TravelModeRecord};
use once_cell::unsync::OnceCell;

pub struct DataStore {
    config: Config,
    congestion: OnceCell<Vec<CongestionRecord>>,
    travel_modes: OnceCell<Vec<TravelModeRecord>>,
    flows: OnceCell<Vec<FlowRecord>>,
}

impl DataStore {
    pub fn new(config: Config) -> Self {
        DataStore {
            config,
            congestion: OnceCell::new(),
            travel_modes: OnceCell::new(),
            flows: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn congestion(&self) -> Result<&[CongestionRecord], LoadError> {
        self.congestion
            .get_or_try_init(|| {
                loader::load_congestion(&self.config.congestion_csv).map(|(records, _)| records)
            })
            .map(Vec::as_slice)
    }

    pub fn travel_modes(&self) -> Result<&[TravelModeRecord], LoadError> {
        self.travel_modes
            .get_or_try_init(|| {
                loader::load_travel_modes(&self.config.travel_modes_csv).map(|(records, _)| records)
            })
            .map(Vec::as_slice)
    }

    pub fn flows(&self) -> Result<&[FlowRecord], LoadError> {
        self.flows
            .get_or_try_init(|| loader::load_flows(&self.config.flows_csv).map(|(records, _)| records))
            .map(Vec::as_slice)
    }
}
