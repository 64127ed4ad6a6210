pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod flows;
pub mod loader;
pub mod output;
pub mod session;
pub mod smooth;
pub mod store;
pub mod types;
pub mod util;
