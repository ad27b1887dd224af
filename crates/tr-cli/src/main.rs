//! Tracker Remover CLI
//!
//! Cleans URLs and manages the settings/stats records outside the browser.

mod storage;

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tr_core::{
    backup_file_name, clean, describe_last_cleaned, SettingsPatch, SiteStats, Store,
};

use crate::storage::{read_file, write_file, FileStorage};

#[derive(Parser)]
#[command(name = "tracker-remover")]
#[command(about = "Strip tracking parameters from search and social URLs")]
struct Cli {
    /// Directory holding settings.json and stats.json
    #[arg(long, global = true, env = "TRACKER_REMOVER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// More log output (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean URLs and count the removals
    Clean {
        /// URLs to clean
        #[arg(required = true)]
        urls: Vec<String>,

        /// Only show the result, do not update stats
        #[arg(long)]
        dry_run: bool,
    },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },

    /// Show per-site stats
    Stats {
        /// Only this site
        #[arg(long)]
        site: Option<String>,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Zero stats for one site, or all sites
    ResetStats {
        #[arg(long)]
        site: Option<String>,
    },

    /// Write a backup file
    Export {
        /// Output file (default: tracker-remover-backup-<date>.json)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Restore settings and/or stats from a backup file
    Import {
        /// Backup file
        input: String,
    },

    /// Send a raw protocol message, e.g. '{"action":"getStats"}'
    Message {
        json: String,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print current settings
    Show,
    /// Merge a JSON settings file into the current settings
    Update {
        /// JSON file with any of ui, trackingEnabled, sites
        file: String,
    },
    /// Restore built-in defaults
    Reset,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<(), String> {
    let data_dir = resolve_data_dir(cli.data_dir)?;
    tracing::debug!(data_dir = %data_dir.display(), "opening store");
    let mut store = Store::load(FileStorage::new(data_dir));

    match cli.command {
        Commands::Clean { urls, dry_run } => cmd_clean(&mut store, &urls, dry_run),
        Commands::Settings { action } => match action {
            SettingsCommand::Show => print_json(store.settings()),
            SettingsCommand::Update { file } => cmd_update_settings(&mut store, Path::new(&file)),
            SettingsCommand::Reset => {
                store.reset_settings();
                println!("Settings reset to defaults");
                Ok(())
            }
        },
        Commands::Stats { site, json } => cmd_stats(&store, site.as_deref(), json),
        Commands::ResetStats { site } => {
            store.reset_stats(site.as_deref());
            match site {
                Some(site) => println!("Reset stats for {}", site),
                None => println!("Reset stats for all sites"),
            }
            Ok(())
        }
        Commands::Export { output } => cmd_export(&store, output),
        Commands::Import { input } => cmd_import(&mut store, Path::new(&input)),
        Commands::Message { json } => {
            println!("{}", store.handle_message(&json));
            Ok(())
        }
    }
}

fn resolve_data_dir(arg: Option<PathBuf>) -> Result<PathBuf, String> {
    if let Some(dir) = arg {
        return Ok(dir);
    }
    dirs::data_dir()
        .map(|base| base.join("tracker-remover"))
        .ok_or_else(|| "Could not determine a data directory, pass --data-dir".to_string())
}

fn cmd_clean(store: &mut Store<FileStorage>, urls: &[String], dry_run: bool) -> Result<(), String> {
    let mut total_removed = 0u64;

    for url in urls {
        let cleaned = if dry_run {
            match clean(url, store.settings()) {
                Ok(cleaned) => cleaned,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping");
                    None
                }
            }
        } else {
            store.process_navigation(url)
        };

        match cleaned {
            Some(cleaned) => {
                total_removed += u64::from(cleaned.removed);
                println!("{}", cleaned.url);
                tracing::info!(site = %cleaned.site, removed = cleaned.removed, "cleaned");
            }
            None => println!("{}", url),
        }
    }

    tracing::info!(urls = urls.len(), removed = total_removed, dry_run, "done");
    Ok(())
}

fn cmd_update_settings(store: &mut Store<FileStorage>, file: &Path) -> Result<(), String> {
    let content = read_file(file)?;
    let patch: SettingsPatch = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid settings in '{}': {}", file.display(), e))?;
    let settings = store.update_settings(patch);
    print_json(settings)
}

fn cmd_stats(store: &Store<FileStorage>, site: Option<&str>, json: bool) -> Result<(), String> {
    let stats = store.stats();
    if let Some(site) = site {
        if !stats.contains(site) {
            return Err(format!("No stats for '{}'", site));
        }
    }

    if json {
        return match site {
            Some(site) => print_json(&stats.get(site)),
            None => print_json(stats),
        };
    }

    let now = Utc::now();
    for (name, entry) in stats.iter().filter(|(name, _)| site.map_or(true, |s| s == *name)) {
        print_site_stats(name, entry, now);
    }
    if site.is_none() {
        print_site_stats("total", &stats.totals(), now);
    }
    Ok(())
}

fn print_site_stats(name: &str, entry: &SiteStats, now: chrono::DateTime<Utc>) {
    println!("{}:", name);
    println!("  Cleaned:     {}", entry.total_cleaned);
    println!("  Removed:     {}", entry.params_removed);
    println!("  {}", describe_last_cleaned(entry.last_cleaned, now));
}

fn cmd_export(store: &Store<FileStorage>, output: Option<String>) -> Result<(), String> {
    let export = store.export_data();
    let json = export
        .to_pretty_json()
        .map_err(|e| format!("Failed to serialize export: {}", e))?;
    let output = output.unwrap_or_else(|| backup_file_name(export.export_date.date_naive()));

    write_file(Path::new(&output), json.as_bytes())?;
    println!("Exported {} sites to '{}'", export.settings.sites.len(), output);
    Ok(())
}

fn cmd_import(store: &mut Store<FileStorage>, input: &Path) -> Result<(), String> {
    let content = read_file(input)?;
    store
        .import_json(&content)
        .map_err(|e| format!("Could not import '{}': {}", input.display(), e))?;
    println!(
        "Imported '{}' ({} sites, {} stats entries)",
        input.display(),
        store.settings().sites.len(),
        store.stats().len()
    );
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize: {}", e))?;
    println!("{}", json);
    Ok(())
}
