#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the police log.
//!
//! Lists and runs the analytics query catalog, browses and adds stops,
//! loads the CSV dataset into the database backend and starts the API
//! server. Without a subcommand an interactive menu is shown.

mod commands;
mod interactive;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use police_log_server_models::StopQueryParams;
use police_log_store::StoreConfig;

#[derive(Parser)]
#[command(name = "police_log", about = "Police traffic-stop log analytics")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Sidebar filter flags shared by `run` and `stops`.
#[derive(clap::Args)]
struct FilterArgs {
    /// Comma-separated list of countries to include
    #[arg(long)]
    country: Option<String>,
    /// Comma-separated list of genders to include (e.g. "M,F")
    #[arg(long)]
    gender: Option<String>,
    /// Youngest driver age to include
    #[arg(long)]
    age_min: Option<u8>,
    /// Oldest driver age to include
    #[arg(long)]
    age_max: Option<u8>,
}

impl FilterArgs {
    fn to_filter(
        &self,
    ) -> Result<police_log_stop_models::StopFilter, police_log_stop_models::InvalidStopError> {
        StopQueryParams {
            countries: self.country.clone(),
            genders: self.gender.clone(),
            age_min: self.age_min,
            age_max: self.age_max,
            limit: None,
        }
        .to_filter()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve,
    /// List the analytics query catalog
    Queries,
    /// Run one catalog query (e.g. "young-driver-violations")
    Run {
        /// Query identifier
        id: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// List stop records
    Stops {
        /// Maximum number of stops to print
        #[arg(long, default_value = "20")]
        limit: usize,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Add a stop through the interactive form
    Add,
    /// Load a CSV dataset into the database backend
    Import {
        /// Path to the CSV file (defaults to `POLICE_LOG_CSV`)
        csv: Option<PathBuf>,
    },
    /// Create the `traffic_stops` table if it does not exist
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run().await;
    };

    match command {
        Commands::Serve => commands::serve(false).await?,
        Commands::Queries => commands::list_queries(),
        Commands::Run { id, filter } => {
            let store = commands::open_store()?;
            commands::run(&store, &id, &filter.to_filter()?).await?;
        }
        Commands::Stops { limit, filter } => {
            let store = commands::open_store()?;
            commands::list_stops(&store, &filter.to_filter()?, limit).await;
        }
        Commands::Add => {
            let store = commands::open_store()?;
            let form = interactive::prompt_stop_form()?;
            commands::add_stop(&store, &form).await?;
        }
        Commands::Import { csv } => {
            let config = StoreConfig::from_env()?;
            let path = csv.unwrap_or_else(|| config.csv_path.clone());
            let inserted = commands::import(&config, &path).await?;
            println!("Imported {inserted} stop(s).");
        }
        Commands::Migrate => {
            let config = StoreConfig::from_env()?;
            commands::migrate(&config).await?;
        }
    }

    Ok(())
}
