//! CLI entry point for the mobility dashboard.
//!
//! `generate` builds the static page, `export` and `flows` print or export a
//! single view, and `interactive` (the default) runs the menu-driven session
//! that recomputes on every filter change.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mobility_report::aggregate::{congestion_view, CongestionFilter};
use mobility_report::config::Config;
use mobility_report::dashboard;
use mobility_report::flows::{summarize_flows, FlowQuery};
use mobility_report::output::{
    flow_preview, preview_table_rows, series_preview, write_flows_csv, write_series_csv,
};
use mobility_report::session;
use mobility_report::store::DataStore;
use mobility_report::types::{Axis, Direction, Metric, TimeOfDay};
use mobility_report::util::{format_int, parse_date};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "mobility_report")]
#[command(about = "Congestion, delay and travel statistics dashboard", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the static dashboard page
    Generate {
        /// Directory to write index.html and dashboard.json into
        #[arg(short, long, env = "MOBILITY_OUT_DIR", default_value = "docs")]
        out_dir: PathBuf,
    },
    /// Menu-driven session that recomputes on every filter change
    Interactive,
    /// Export one congestion or delay view as CSV
    Export {
        #[arg(long, value_enum, default_value_t = MetricArg::Ko)]
        metric: MetricArg,

        #[arg(long, value_enum, default_value_t = AxisArg::Dato)]
        axis: AxisArg,

        #[arg(long, value_enum, default_value_t = BucketArg::Morgen)]
        bucket: BucketArg,

        /// Locations to include; none means all locations
        #[arg(short, long = "location")]
        locations: Vec<String>,

        /// Earliest date to include (YYYY-MM-DD or DD,MM,YYYY)
        #[arg(long)]
        start_date: Option<String>,

        #[arg(short, long, default_value = "eksport.csv")]
        output: PathBuf,
    },
    /// Print the largest origin/destination flows
    Flows {
        #[arg(long, value_enum, default_value_t = DirectionArg::Til)]
        direction: DirectionArg,

        /// Zones on the selected side; none means all zones
        #[arg(short, long = "zone")]
        zones: Vec<String>,

        #[arg(long)]
        time_of_day: Option<String>,

        #[arg(long)]
        day_type: Option<String>,

        /// Also export the summary as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Ko,
    Forsinkelser,
}

#[derive(Clone, Copy, ValueEnum)]
enum AxisArg {
    Dato,
    Klokkeslett,
}

#[derive(Clone, Copy, ValueEnum)]
enum BucketArg {
    Morgen,
    Ettermiddag,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Fra,
    Til,
}

impl From<MetricArg> for Metric {
    fn from(m: MetricArg) -> Self {
        match m {
            MetricArg::Ko => Metric::Congestion,
            MetricArg::Forsinkelser => Metric::Delay,
        }
    }
}

impl From<AxisArg> for Axis {
    fn from(a: AxisArg) -> Self {
        match a {
            AxisArg::Dato => Axis::Date,
            AxisArg::Klokkeslett => Axis::ClockTime,
        }
    }
}

impl From<BucketArg> for TimeOfDay {
    fn from(b: BucketArg) -> Self {
        match b {
            BucketArg::Morgen => TimeOfDay::Morgen,
            BucketArg::Ettermiddag => TimeOfDay::Ettermiddag,
        }
    }
}

impl From<DirectionArg> for Direction {
    fn from(d: DirectionArg) -> Self {
        match d {
            DirectionArg::Fra => Direction::From,
            DirectionArg::Til => Direction::To,
        }
    }
}

fn init_logging() -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    tracing_subscriber::registry().with(stderr_layer).init();
    Ok(())
}

fn handle_generate(store: &DataStore, out_dir: PathBuf) -> Result<()> {
    println!("Laster data og aggregerer...");
    let summary = dashboard::generate(store, &out_dir)?;
    println!(
        "  - {} kødatasett, {} strekninger med reisestatistikk, {} strømsammendrag",
        format_int(summary.congestion_entries as u64),
        format_int(summary.routes as u64),
        format_int(summary.flow_summaries as u64)
    );
    println!("\nFerdig! Generert: {}", summary.html_path.display());
    println!("Filstørrelse: {:.1} KB", summary.html_bytes as f64 / 1024.0);
    Ok(())
}

fn handle_export(
    store: &DataStore,
    metric: Metric,
    filter: CongestionFilter,
    output: PathBuf,
) -> Result<()> {
    let records = store.congestion()?;
    let Some(view) = congestion_view(records, &filter) else {
        println!("Ingen data for valgt filter.");
        return Ok(());
    };
    preview_table_rows(&series_preview(&view, metric), 10);
    let rows = write_series_csv(&output, filter.axis, metric, &view)?;
    println!("Eksporterte {} rader til {}", rows, output.display());
    Ok(())
}

fn handle_flows(store: &DataStore, query: FlowQuery, output: Option<PathBuf>) -> Result<()> {
    let records = store.flows()?;
    let summary = summarize_flows(records, &query);
    if summary.is_empty() {
        println!("Ingen data for valgt filter.");
        return Ok(());
    }
    println!("Kvartaler: {}\n", summary.quarters.join(", "));
    preview_table_rows(&flow_preview(&summary), query.top_k);
    if let Some(path) = output {
        let rows = write_flows_csv(&path, &summary)?;
        println!("Eksporterte {} rader til {}", rows, path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging()?;

    let cli = Cli::parse();
    info!(
        congestion = %cli.config.congestion_csv.display(),
        travel_modes = %cli.config.travel_modes_csv.display(),
        flows = %cli.config.flows_csv.display(),
        "Using data files"
    );
    let store = DataStore::new(cli.config);

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Generate { out_dir } => handle_generate(&store, out_dir)?,
        Commands::Interactive => session::run(&store, io::stdin().lock())?,
        Commands::Export {
            metric,
            axis,
            bucket,
            locations,
            start_date,
            output,
        } => {
            let start_date = match start_date {
                Some(s) => match parse_date(&s) {
                    Some(d) => Some(d),
                    None => bail!("unparseable start date {:?}", s),
                },
                None => None,
            };
            let filter = CongestionFilter {
                bucket: bucket.into(),
                axis: axis.into(),
                start_date,
                locations,
            };
            handle_export(&store, metric.into(), filter, output)?
        }
        Commands::Flows {
            direction,
            zones,
            time_of_day,
            day_type,
            output,
        } => {
            let config = store.config();
            let mut query = FlowQuery::new(direction.into(), zones);
            query.time_of_day = time_of_day;
            query.day_type = day_type;
            query.recent_quarters = config.recent_quarters;
            query.top_k = config.top_pairs;
            handle_flows(&store, query, output)?
        }
    }
    Ok(())
}
