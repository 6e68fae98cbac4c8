use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hm_cli::commands::util::{parse_datetime, render_outcome};
use hm_cli::commands::{import, power, readings, temperature};
use hm_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(hm_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = hm_db::Database::open(&config.database_path).with_context(|| {
        format!("failed to open database {}", config.database_path.display())
    })?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let now = Utc::now();
    match &cli.command {
        Some(Commands::Import) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let summary = import::run(&mut db, io::stdin().lock())?;
            println!(
                "Imported {} rooms, {} devices, {} readings",
                summary.rooms, summary.devices, summary.readings
            );
        }
        Some(Commands::Readings {
            device,
            start,
            end,
            json,
        }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let start = start.as_deref().map(|s| parse_datetime(s, now)).transpose()?;
            let end = end.as_deref().map(|s| parse_datetime(s, now)).transpose()?;
            let found = readings::run(&db, config.analysis()?, device, start, end)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                print!("{}", readings::format_readings(&found));
            }
        }
        Some(Commands::TemperatureDiff {
            outdoor,
            indoor,
            start,
            end,
            delta,
            json,
        }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let window = (parse_datetime(start, now)?, parse_datetime(end, now)?);
            let outcome = temperature::run(
                &db,
                config.analysis()?,
                outdoor,
                indoor,
                window,
                config.delta(*delta)?,
            )?;
            println!("{}", render_outcome(&outcome, *json)?);
        }
        Some(Commands::PeakPower {
            start,
            end,
            delta,
            json,
        }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let window = (parse_datetime(start, now)?, parse_datetime(end, now)?);
            let outcome = power::run(&db, config.analysis()?, window, config.delta(*delta)?)?;
            println!("{}", render_outcome(&outcome, *json)?);
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
