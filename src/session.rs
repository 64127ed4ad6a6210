// Interactive console session.
//
// Every filter change recomputes the selected view from the tables held by
// the `DataStore`; nothing is cached between views except the loaded rows.
// Input comes from any `BufRead` so the loop can be driven from tests.
use crate::aggregate::{congestion_view, locations, mode_view, routes, CongestionFilter};
use crate::flows::{summarize_flows, zones, FlowQuery};
use crate::output::{
    flow_preview, mode_preview, preview_table_rows, series_preview, write_flows_csv,
    write_modes_csv, write_series_csv,
};
use crate::store::DataStore;
use crate::types::{Axis, Direction, Metric, TimeOfDay, ALL_LOCATIONS, ALL_ZONES};
use crate::util::{format_int, parse_date};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, error};

/// Rows shown in console previews before truncating.
const PREVIEW_ROWS: usize = 15;

struct Prompt<R> {
    input: R,
}

impl<R: BufRead> Prompt<R> {
    /// Print `label` and read one trimmed line. `None` on end of input.
    fn ask(&mut self, label: &str) -> Option<String> {
        print!("{}", label);
        let _ = io::stdout().flush();
        let mut buf = String::new();
        match self.input.read_line(&mut buf) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(buf.trim().to_string()),
        }
    }

    /// Ask until the answer is one of `1..=options.len()`; empty picks the
    /// first option.
    fn choose<T: Copy>(&mut self, title: &str, options: &[(&str, T)]) -> Option<T> {
        println!("{}", title);
        for (i, (label, _)) in options.iter().enumerate() {
            println!("  [{}] {}", i + 1, label);
        }
        loop {
            let answer = self.ask("Valg: ")?;
            if answer.is_empty() {
                return Some(options[0].1);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Some(options[n - 1].1),
                _ => println!("Ugyldig valg. Skriv et tall mellom 1 og {}.", options.len()),
            }
        }
    }

    /// Pick zero or more entries from `names`, by number or by name,
    /// separated by commas. Empty selects nothing.
    fn pick_many(&mut self, title: &str, names: &[String]) -> Option<Vec<String>> {
        println!("{}", title);
        for (i, name) in names.iter().enumerate() {
            println!("  [{}] {}", i + 1, name);
        }
        loop {
            let answer = self.ask("Valg (kommaseparert, tomt for alle): ")?;
            let mut picked = Vec::new();
            let mut unknown = Vec::new();
            for part in answer.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let by_number = part
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| names.get(i));
                let by_name = names.iter().find(|n| n.eq_ignore_ascii_case(part));
                match by_number.or(by_name) {
                    Some(name) => picked.push(name.clone()),
                    None => unknown.push(part.to_string()),
                }
            }
            if unknown.is_empty() {
                return Some(picked);
            }
            println!("Ukjent valg: {}", unknown.join(", "));
        }
    }

    fn confirm(&mut self, label: &str) -> Option<bool> {
        loop {
            let answer = self.ask(label)?.to_uppercase();
            match answer.as_str() {
                "J" | "Y" => return Some(true),
                "N" | "" => return Some(false),
                _ => println!("Skriv J eller N."),
            }
        }
    }

    fn export_path(&mut self, default_name: &str) -> Option<Option<PathBuf>> {
        if !self.confirm("Eksporter CSV? (J/N): ")? {
            return Some(None);
        }
        let name = self.ask(&format!("Filnavn [{}]: ", default_name))?;
        let name = if name.is_empty() { default_name.to_string() } else { name };
        Some(Some(PathBuf::from(name)))
    }
}

/// Run the menu loop until the user exits or input ends.
pub fn run<R: BufRead>(store: &DataStore, input: R) -> Result<()> {
    let mut prompt = Prompt { input };
    loop {
        println!("Velg side:");
        println!("[1] Forsinkelser");
        println!("[2] Reisestatistikk");
        println!("[3] Reisestrømmer");
        println!("[4] Kart");
        println!("[0] Avslutt\n");
        let Some(choice) = prompt.ask("Valg: ") else {
            break;
        };
        let outcome = match choice.as_str() {
            "1" => congestion_page(store, &mut prompt),
            "2" => travel_mode_page(store, &mut prompt),
            "3" => flow_page(store, &mut prompt),
            "4" => {
                println!("Interaktivt kart: {}\n", store.config().map_url);
                Ok(Some(()))
            }
            "0" => {
                println!("Avslutter.");
                break;
            }
            _ => {
                println!("Ugyldig valg. Skriv 0-4.\n");
                Ok(Some(()))
            }
        };
        match outcome {
            Ok(Some(())) => {}
            // Input ended inside a page.
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "View failed");
                println!("Feil: {:#}\n", e);
            }
        }
    }
    Ok(())
}

/// `Ok(None)` means input ended while the page was prompting.
type PageResult = Result<Option<()>>;

fn congestion_page<R: BufRead>(store: &DataStore, prompt: &mut Prompt<R>) -> PageResult {
    let records = store.congestion()?;
    println!(
        "{} observasjoner lastet.\n",
        format_int(records.len() as u64)
    );

    let Some(metric) = prompt.choose(
        "Velg visning:",
        &[(Metric::Congestion.title(), Metric::Congestion), (Metric::Delay.title(), Metric::Delay)],
    ) else {
        return Ok(None);
    };
    let Some(axis) = prompt.choose(
        "Vis over:",
        &[("Over dato", Axis::Date), ("Over klokkeslett", Axis::ClockTime)],
    ) else {
        return Ok(None);
    };
    let Some(bucket) = prompt.choose(
        "Tid på døgnet:",
        &[(TimeOfDay::Morgen.label(), TimeOfDay::Morgen), (TimeOfDay::Ettermiddag.label(), TimeOfDay::Ettermiddag)],
    ) else {
        return Ok(None);
    };
    let Some(selected) = prompt.pick_many("Strekning:", &locations(records)) else {
        return Ok(None);
    };

    let start_date = loop {
        let Some(answer) = prompt.ask("Startdato (DD.MM.YYYY eller YYYY-MM-DD, tomt for alle): ")
        else {
            return Ok(None);
        };
        if answer.is_empty() {
            break None;
        }
        match parse_date(&answer) {
            Some(d) => break Some(d),
            None => println!("Ugyldig dato."),
        }
    };

    let filter = CongestionFilter {
        bucket,
        axis,
        start_date,
        locations: selected,
    };
    debug!(?filter, "Recomputing congestion view");

    let Some(view) = congestion_view(records, &filter) else {
        println!("Ingen data for valgt filter.\n");
        return Ok(Some(()));
    };

    let scope = if filter.locations.is_empty() {
        ALL_LOCATIONS.to_lowercase()
    } else {
        "utvalgte strekninger".to_string()
    };
    println!("\n{} - {} ({})\n", metric.title(), scope, bucket.label().to_lowercase());
    preview_table_rows(&series_preview(&view, metric), PREVIEW_ROWS);

    let default_name = format!("eksport_{}.csv", metric.key());
    let Some(path) = prompt.export_path(&default_name) else {
        return Ok(None);
    };
    if let Some(path) = path {
        let rows = write_series_csv(&path, axis, metric, &view)?;
        println!("Eksporterte {} rader til {}\n", rows, path.display());
    }
    Ok(Some(()))
}

fn travel_mode_page<R: BufRead>(store: &DataStore, prompt: &mut Prompt<R>) -> PageResult {
    let records = store.travel_modes()?;
    let names = routes(records);
    if names.is_empty() {
        println!("Ingen data for valgt filter.\n");
        return Ok(Some(()));
    }
    let options: Vec<(&str, usize)> = names.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
    let Some(i) = prompt.choose("Strekning:", &options) else {
        return Ok(None);
    };
    let route = &names[i];

    let Some(series) = mode_view(records, route) else {
        println!("Ingen data for valgt filter.\n");
        return Ok(Some(()));
    };
    println!("\nReisestatistikk - {} (1000 reiser per kvartal)\n", route);
    preview_table_rows(&mode_preview(&series), PREVIEW_ROWS);

    let Some(path) = prompt.export_path("eksport_reisestatistikk.csv") else {
        return Ok(None);
    };
    if let Some(path) = path {
        let rows = write_modes_csv(&path, &series)?;
        println!("Eksporterte {} rader til {}\n", rows, path.display());
    }
    Ok(Some(()))
}

fn flow_page<R: BufRead>(store: &DataStore, prompt: &mut Prompt<R>) -> PageResult {
    let records = store.flows()?;
    let config = store.config();

    let Some(direction) = prompt.choose(
        "Retning:",
        &[("Til valgte soner", Direction::To), ("Fra valgte soner", Direction::From)],
    ) else {
        return Ok(None);
    };
    let Some(selected) = prompt.pick_many("Soner:", &zones(records)) else {
        return Ok(None);
    };

    let mut query = FlowQuery::new(direction, selected);
    query.recent_quarters = config.recent_quarters;
    query.top_k = config.top_pairs;
    let summary = summarize_flows(records, &query);
    if summary.is_empty() {
        println!("Ingen data for valgt filter.\n");
        return Ok(Some(()));
    }

    let scope = if query.zones.is_empty() {
        ALL_ZONES.to_lowercase()
    } else {
        query.zones.join(", ")
    };
    let arrow = match direction {
        Direction::To => "til",
        Direction::From => "fra",
    };
    println!(
        "\nStørste reisestrømmer {} {} ({})\n",
        arrow,
        scope,
        summary.quarters.join(", ")
    );
    preview_table_rows(&flow_preview(&summary), query.top_k);

    let Some(path) = prompt.export_path("eksport_reisestrommer.csv") else {
        return Ok(None);
    };
    if let Some(path) = path {
        let rows = write_flows_csv(&path, &summary)?;
        println!("Eksporterte {} rader til {}\n", rows, path.display());
    }
    Ok(Some(()))
}
