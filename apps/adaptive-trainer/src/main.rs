//! Adaptive Trainer - flashcard reviews scheduled from your own history.

mod app;
mod config;
mod db;

use app::{format_timestamp, format_until, App};
use clap::{Parser, Subcommand};
use config::Config;
use db::Database;
use srs_engine::SystemClock;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Review flashcards on a schedule learned from your own review history.
#[derive(Parser)]
#[command(name = "adaptive-trainer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new item
    Add { front: String, back: String },

    /// Replace the back of an existing item
    Edit { front: String, back: String },

    /// Remove an item and its history
    Remove { front: String },

    /// List every item with its next review
    List,

    /// Show how many items are due
    Due,

    /// Report learned statistics for every outcome pattern
    Analyze {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Review the items that are due
    Review,

    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        write: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Commands::Config { write } = cli.command {
        let config_path = cli.config.clone().or_else(Config::config_path);
        if let Some(path) = &config_path {
            println!("# {}", path.display());
            if write {
                config.save_to(path)?;
            }
        }
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let db_path = cli
        .db
        .clone()
        .or_else(Config::db_path)
        .unwrap_or_else(|| "items.db".into());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    debug!(path = %db_path.display(), "opening database");
    let db = Database::open(&db_path)?;
    let mut app = App::new(db, config, Arc::new(SystemClock))?;

    match cli.command {
        Commands::Add { front, back } => {
            app.add_item(&front, &back)?;
            println!("Added \"{front}\" ({} items due)", app.due_count());
        }
        Commands::Edit { front, back } => {
            app.edit_item(&front, &back)?;
            println!("Updated \"{front}\"");
        }
        Commands::Remove { front } => {
            app.remove_item(&front)?;
            println!("Removed \"{front}\"");
        }
        Commands::List => {
            for (item, until) in app.schedule()? {
                println!(
                    "{:<30} {:>6} reviews  {:<16}  {}",
                    item.front,
                    item.reviews().len(),
                    format_until(until),
                    format_timestamp(app.scheduler.next_review(&item)),
                );
            }
        }
        Commands::Due => {
            let overview = app.overview()?;
            println!(
                "{} of {} items due ({} never reviewed, {:.0}% retention over {} reviews)",
                overview.due,
                overview.total_items,
                overview.never_reviewed,
                overview.retention_rate * 100.0,
                overview.total_reviews,
            );
        }
        Commands::Analyze { json } => {
            let report = app.analyze()?;
            let reviews = app.db.review_count()?;
            debug!(reviews, "analyzed collection");
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
        }
        Commands::Review => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut out = io::stdout();
            app.run_review(&mut input, &mut out)?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}
