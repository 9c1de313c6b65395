#![cfg(not(tarpaulin_include))]

use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use log::{info, warn};

use residence_tracker::app;
use residence_tracker::loader;
use residence_tracker::roster::Roster;
use residence_tracker::saving;

/// Residence-status deadline dashboard server.
///
/// Serves the dashboard API over an in-memory roster. The roster starts
/// empty unless an initial CSV file or a snapshot is given; a file that
/// fails to load is reported and skipped, the server still starts.
#[derive(Parser)]
#[command(name = "server", version, about = "Residence-status deadline dashboard server")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Roster CSV to load at startup
    #[arg(long)]
    file: Option<PathBuf>,

    /// Roster snapshot (.bin.gz) to restore when no CSV is given
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let today = Local::now().date_naive();

    let roster = if let Some(path) = &args.file {
        match loader::load_roster(path, today) {
            Ok(roster) => {
                info!("loaded {} records from {}", roster.len(), path.display());
                roster
            }
            Err(e) => {
                warn!("could not load {}: {}", path.display(), e);
                Roster::new()
            }
        }
    } else if let Some(path) = &args.snapshot {
        match saving::load_snapshot(path.to_string_lossy().as_ref()) {
            Ok(mut roster) => {
                roster.reclassify(today);
                info!("restored {} records from {}", roster.len(), path.display());
                roster
            }
            Err(e) => {
                warn!("could not restore {}: {}", path.display(), e);
                Roster::new()
            }
        }
    } else {
        Roster::new()
    };

    app::run(&format!("{}:{}", args.host, args.port), roster).await
}
