//! Command-line interface for the hub mapper.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::ImportMode;
use crate::core::entry::{parse_count, EntryPatch, LocatedEntry};
use crate::core::geo::Position;
use crate::core::writers::write_entries_csv;
use crate::geocode::{Geocoder, GoogleGeocoder};
use crate::processors::import::import_csv;
use crate::processors::radius::parse_radius_override;
use crate::session::MapSession;
use crate::storage::{EntryRepository, HttpRepository, JsonFileRepository};
use crate::MapperConfig;

#[derive(Parser)]
#[command(name = "hub-mapper")]
#[command(about = "Plot addresses, find car hubs and probe local totals", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON data file (overrides the config)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// Use a running service at this base URL instead of the data file
    #[arg(long, global = true, conflicts_with = "data_file")]
    remote: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the entry list over HTTP
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (defaults to $PORT, then the config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print all stored entries
    List,

    /// Geocode an address and add it
    Add {
        /// Address to geocode
        address: String,
        /// Influence radius in meters
        #[arg(short, long, value_parser = parse_radius_arg)]
        radius: Option<f64>,
        /// Number of cars at this address
        #[arg(long)]
        cars: Option<String>,
        /// Free-form tag
        #[arg(long)]
        tag: Option<String>,
        /// Circle fill color
        #[arg(long)]
        circle_color: Option<String>,
        /// Marker dot color
        #[arg(long)]
        dot_color: Option<String>,
        /// Do not draw the radius circle
        #[arg(long)]
        hide_circle: bool,
    },

    /// Edit fields of a stored entry
    Edit {
        /// Entry index as shown by `list`
        index: usize,
        #[arg(short, long, value_parser = parse_radius_arg)]
        radius: Option<f64>,
        #[arg(long)]
        cars: Option<String>,
        /// Remove the car count
        #[arg(long, conflicts_with = "cars")]
        clear_cars: bool,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        circle_color: Option<String>,
        #[arg(long)]
        dot_color: Option<String>,
        /// Show or hide the radius circle
        #[arg(long)]
        show_circle: Option<bool>,
    },

    /// Remove a stored entry
    Remove {
        /// Entry index as shown by `list`
        index: usize,
    },

    /// Geocode an address CSV and load it
    Import {
        /// CSV with address,tag,circleColor,dotColor,radius,numOfCars,showCircle
        csv_file: PathBuf,
        /// Replace the list (default) or append to it
        #[arg(long, value_enum)]
        mode: Option<ImportMode>,
    },

    /// Export stored entries as CSV
    Export {
        /// Output CSV path
        #[arg(default_value = "addresses.csv")]
        output: PathBuf,
    },

    /// Find hubs whose combined car count exceeds a threshold
    Hubs {
        /// Combined count a hub must exceed
        #[arg(short, long)]
        threshold: Option<f64>,
        /// Radius in meters applied to every entry for this run only
        #[arg(long)]
        radius_override: Option<String>,
    },

    /// Total cars covering a position
    Probe {
        /// Latitude in degrees
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in degrees
        #[arg(allow_negative_numbers = true)]
        lng: f64,
    },

    /// Set every stored entry's radius to the same value
    OverrideRadius {
        /// Radius in meters
        radius: String,
    },
}

/// Accept only radii that can be stored: finite and non-negative.
fn parse_radius_arg(raw: &str) -> Result<f64, String> {
    parse_radius_override(raw).ok_or_else(|| format!("'{}' is not a non-negative number of meters", raw))
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    error!("{}: {}", context, err);
    std::process::exit(1);
}

/// Where entries are read from and written to for this invocation.
fn open_repository(cli: &Cli, config: &MapperConfig) -> Box<dyn EntryRepository> {
    match &cli.remote {
        Some(url) => {
            let timeout = Duration::from_secs(config.storage.remote_timeout_secs);
            match HttpRepository::new(url, timeout) {
                Ok(repo) => {
                    info!("Using remote list at {}", repo.url());
                    Box::new(repo)
                }
                Err(e) => fail("Failed to create HTTP client", e),
            }
        }
        None => Box::new(JsonFileRepository::new(config.storage.data_file.clone())),
    }
}

/// Load the stored list into a session.
///
/// Read-only commands fall back to an empty list when loading fails;
/// mutating commands stop instead of overwriting data they could not read.
fn load_session(repo: &dyn EntryRepository, config: &MapperConfig, for_write: bool) -> MapSession {
    match repo.load() {
        Ok(entries) => MapSession::with_entries(entries, &config.hubs),
        Err(e) if for_write => fail("Failed to load entries", e),
        Err(e) => {
            warn!("Failed to load entries: {}, using an empty list", e);
            MapSession::with_entries(Vec::new(), &config.hubs)
        }
    }
}

fn save_session(repo: &dyn EntryRepository, session: &MapSession) {
    if let Err(e) = repo.save(session.entries()) {
        fail("Failed to save entries", e);
    }
}

fn make_geocoder(config: &MapperConfig) -> GoogleGeocoder {
    match GoogleGeocoder::new(&config.geocoder) {
        Ok(g) => g,
        Err(e) => fail("Geocoder unavailable", e),
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let mut config = match &cli.config {
        Some(path) => match MapperConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                MapperConfig::default()
            }
        },
        None => MapperConfig::default(),
    };
    if let Some(path) = &cli.data_file {
        config.storage.data_file = path.clone();
    }

    // Dispatch to subcommands
    match &cli.command {
        Commands::Serve { host, port } => cmd_serve(host.clone(), *port, config),
        Commands::List => cmd_list(&cli, &config),
        Commands::Add {
            address,
            radius,
            cars,
            tag,
            circle_color,
            dot_color,
            hide_circle,
        } => {
            let mut entry_template = LocatedEntry::new(address.clone(), Position::new(0.0, 0.0))
                .with_radius(radius.unwrap_or(config.entries.radius_m));
            entry_template.count = cars.as_deref().and_then(parse_count);
            entry_template.display.tag = tag.clone().unwrap_or_default();
            entry_template.display.circle_color = circle_color
                .clone()
                .unwrap_or_else(|| config.entries.circle_color.clone());
            entry_template.display.dot_color =
                dot_color.clone().unwrap_or_else(|| config.entries.dot_color.clone());
            entry_template.display.show_circle = !hide_circle;
            cmd_add(&cli, &config, entry_template);
        }
        Commands::Edit {
            index,
            radius,
            cars,
            clear_cars,
            tag,
            circle_color,
            dot_color,
            show_circle,
        } => {
            let count = if *clear_cars {
                Some(None)
            } else {
                cars.as_deref().map(parse_count)
            };
            let patch = EntryPatch {
                radius: *radius,
                count,
                tag: tag.clone(),
                circle_color: circle_color.clone(),
                dot_color: dot_color.clone(),
                show_circle: *show_circle,
                ..Default::default()
            };
            cmd_edit(&cli, &config, *index, &patch);
        }
        Commands::Remove { index } => cmd_remove(&cli, &config, *index),
        Commands::Import { csv_file, mode } => {
            cmd_import(&cli, &config, csv_file, mode.unwrap_or(config.hubs.import_mode))
        }
        Commands::Export { output } => cmd_export(&cli, &config, output),
        Commands::Hubs {
            threshold,
            radius_override,
        } => cmd_hubs(&cli, &config, *threshold, radius_override.as_deref()),
        Commands::Probe { lat, lng } => cmd_probe(&cli, &config, *lat, *lng),
        Commands::OverrideRadius { radius } => cmd_override_radius(&cli, &config, radius),
    }
}

fn cmd_serve(host: Option<String>, port: Option<u16>, mut config: MapperConfig) {
    if let Some(host) = host {
        config.server.host = host;
    }
    let env_port = std::env::var("PORT").ok().and_then(|p| p.parse().ok());
    if let Some(port) = port.or(env_port) {
        config.server.port = port;
    }

    println!(
        "Serving {} on http://{}:{}",
        config.storage.data_file.display(),
        config.server.host,
        config.server.port
    );
    if let Err(e) = crate::server::run(&config) {
        fail("Server stopped", format!("{:#}", e));
    }
}

fn cmd_list(cli: &Cli, config: &MapperConfig) {
    let repo = open_repository(cli, config);
    let session = load_session(repo.as_ref(), config, false);

    if session.entries().is_empty() {
        println!("No entries stored.");
        return;
    }

    println!(
        "{:>4}  {:<36} {:>10} {:>11} {:>8} {:>6}  {}",
        "#", "address", "lat", "lng", "radius", "cars", "tag"
    );
    for (i, entry) in session.entries().iter().enumerate() {
        println!(
            "{:>4}  {:<36} {:>10.5} {:>11.5} {:>8} {:>6}  {}",
            i,
            entry.address,
            entry.position.lat,
            entry.position.lng,
            entry.radius,
            entry.count.map(|c| c.to_string()).unwrap_or_else(|| "N/A".to_string()),
            if entry.display.tag.is_empty() {
                "N/A"
            } else {
                entry.display.tag.as_str()
            }
        );
    }
}

fn cmd_add(cli: &Cli, config: &MapperConfig, template: LocatedEntry) {
    let repo = open_repository(cli, config);
    let mut session = load_session(repo.as_ref(), config, true);
    let geocoder = make_geocoder(config);

    let spinner = create_spinner(&format!("Geocoding '{}'...", template.address));
    let resolved = geocoder.resolve(&template.address);
    spinner.finish_and_clear();

    let Some(position) = resolved else {
        error!("No coordinates found for the given address.");
        std::process::exit(1);
    };

    let entry = LocatedEntry {
        position,
        ..template
    };
    let address = entry.address.clone();
    let index = session.add(entry);
    save_session(repo.as_ref(), &session);

    println!(
        "Added #{} {} at ({:.5}, {:.5})",
        index, address, position.lat, position.lng
    );
}

fn cmd_edit(cli: &Cli, config: &MapperConfig, index: usize, patch: &EntryPatch) {
    if patch.is_empty() {
        warn!("Nothing to change");
        return;
    }
    let repo = open_repository(cli, config);
    let mut session = load_session(repo.as_ref(), config, true);

    match session.edit(index, patch) {
        Ok(entry) => {
            save_session(repo.as_ref(), &session);
            println!("Updated #{} {}", index, entry.address);
        }
        Err(e) => fail("Edit failed", e),
    }
}

fn cmd_remove(cli: &Cli, config: &MapperConfig, index: usize) {
    let repo = open_repository(cli, config);
    let mut session = load_session(repo.as_ref(), config, true);

    match session.remove(index) {
        Ok(entry) => {
            save_session(repo.as_ref(), &session);
            println!("Removed #{} {}", index, entry.address);
        }
        Err(e) => fail("Remove failed", e),
    }
}

fn cmd_import(cli: &Cli, config: &MapperConfig, csv_file: &PathBuf, mode: ImportMode) {
    let start = Instant::now();
    let repo = open_repository(cli, config);
    // A replacing import never reads the old list, so it cannot be blocked by it.
    let mut session = match mode {
        ImportMode::Append => load_session(repo.as_ref(), config, true),
        ImportMode::Replace => MapSession::with_entries(Vec::new(), &config.hubs),
    };
    let geocoder = make_geocoder(config);

    println!("Importing {}", csv_file.display());
    let spinner = create_spinner("Geocoding addresses...");

    let report = match import_csv(csv_file, &config.entries, &geocoder) {
        Ok(report) => report,
        Err(e) => {
            spinner.finish_and_clear();
            fail("Failed to read CSV", e);
        }
    };
    spinner.finish_and_clear();

    let rows_seen = report.rows_seen();
    let imported = report.entries.len();
    let dropped = report.dropped.clone();
    session.apply_import(report, mode);
    save_session(repo.as_ref(), &session);

    for address in &dropped {
        warn!("Dropped row: '{}'", address);
    }

    print_summary(
        "Import Complete",
        &[
            ("Input file", csv_file.display().to_string()),
            ("Mode", format!("{:?}", mode)),
            ("Rows read", rows_seen.to_string()),
            ("Imported", imported.to_string()),
            ("Dropped", dropped.len().to_string()),
            ("Entries stored", session.entries().len().to_string()),
            ("Hubs", session.hubs().len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_export(cli: &Cli, config: &MapperConfig, output: &PathBuf) {
    let repo = open_repository(cli, config);
    let session = load_session(repo.as_ref(), config, false);

    if session.entries().is_empty() {
        println!("No entries to export.");
        return;
    }

    match write_entries_csv(output, session.entries()) {
        Ok(()) => println!("Exported {} entries to {}", session.entries().len(), output.display()),
        Err(e) => fail("Export failed", e),
    }
}

fn cmd_hubs(cli: &Cli, config: &MapperConfig, threshold: Option<f64>, radius_override: Option<&str>) {
    let start = Instant::now();
    let repo = open_repository(cli, config);
    let mut session = load_session(repo.as_ref(), config, false);

    // Applied to this run only; nothing is saved.
    let radius = match radius_override {
        Some(raw) => parse_radius_override(raw).or_else(|| {
            warn!("Ignoring radius override '{}': not a non-negative number", raw);
            None
        }),
        None => config.hubs.radius_override,
    };
    if let Some(radius) = radius {
        session.set_radius_override(Some(radius));
    }
    if threshold.is_some() {
        session.set_threshold(threshold);
    }

    let Some(active) = session.threshold() else {
        println!("No threshold set; hub detection is disabled.");
        return;
    };

    for (i, hub) in session.hubs().iter().enumerate() {
        let names: Vec<&str> = hub
            .members
            .iter()
            .filter_map(|&m| session.entries().get(m))
            .map(|e| e.address.as_str())
            .collect();
        println!(
            "Hub {} at ({:.5}, {:.5}): {} cars from {} entries [{}]",
            i + 1,
            hub.centroid.lat,
            hub.centroid.lng,
            hub.total_count,
            hub.members.len(),
            names.join("; ")
        );
    }

    let clustered: usize = session.hubs().iter().map(|h| h.members.len()).sum();
    print_summary(
        "Hub Detection Complete",
        &[
            ("Entries", session.entries().len().to_string()),
            ("Threshold", active.to_string()),
            (
                "Radius override",
                session
                    .radius_override()
                    .map(|r| format!("{} m", r))
                    .unwrap_or_else(|| "none".to_string()),
            ),
            ("Hubs found", session.hubs().len().to_string()),
            ("Entries in hubs", clustered.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_probe(cli: &Cli, config: &MapperConfig, lat: f64, lng: f64) {
    let Some(position) = Position::checked(lat, lng) else {
        fail("Invalid position", format!("({}, {}) is out of range", lat, lng));
    };
    let repo = open_repository(cli, config);
    let session = load_session(repo.as_ref(), config, false);

    let aggregate = session.probe(position);
    if aggregate.visible() {
        println!("Total cars in area: {}", aggregate.total_count);
    } else {
        println!("No cars in range of ({}, {})", lat, lng);
    }
}

fn cmd_override_radius(cli: &Cli, config: &MapperConfig, raw: &str) {
    let Some(radius) = parse_radius_override(raw) else {
        fail("Invalid radius", format!("'{}' is not a non-negative number", raw));
    };
    let repo = open_repository(cli, config);
    let mut session = load_session(repo.as_ref(), config, true);

    session.set_radius_override(Some(radius));
    save_session(repo.as_ref(), &session);
    println!("Set radius of {} entries to {} m", session.entries().len(), radius);
}
