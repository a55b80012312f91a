//! Interactive menu for the police log CLI.
//!
//! Provides a menu-driven interface using `dialoguer` for running queries,
//! browsing and adding stops without memorizing CLI flags.

use std::path::Path;

use chrono::{Local, NaiveDate, NaiveTime};
use dialoguer::{Confirm, Input, MultiSelect, Select};
use police_log_analytics_models::QueryId;
use police_log_stop_models::{
    AgeRange, DEFAULT_DRIVER_AGE, DriverGender, FilterOptions, MAX_DRIVER_AGE, NewStopForm,
    StopFilter, StopOutcome, VIOLATION_SUGGESTIONS,
};
use police_log_store::{StoreConfig, StoreHandle, load_or_empty};

use crate::commands;

/// Top-level actions available in the interactive menu.
enum MenuAction {
    RunQuery,
    BrowseStops,
    AddStop,
    ListQueries,
    ImportCsv,
    Migrate,
    StartServer,
}

impl MenuAction {
    const ALL: &[Self] = &[
        Self::RunQuery,
        Self::BrowseStops,
        Self::AddStop,
        Self::ListQueries,
        Self::ImportCsv,
        Self::Migrate,
        Self::StartServer,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunQuery => "Run a query",
            Self::BrowseStops => "Browse stops",
            Self::AddStop => "Add a stop",
            Self::ListQueries => "List queries",
            Self::ImportCsv => "Import CSV into the database",
            Self::Migrate => "Create database schema",
            Self::StartServer => "Start server",
        }
    }
}

/// Shows the menu and runs the selected action.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected action fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Police Log");
    println!();

    let labels: Vec<&str> = MenuAction::ALL.iter().map(MenuAction::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match MenuAction::ALL[idx] {
        MenuAction::RunQuery => {
            let store = commands::open_store()?;
            let filter = prompt_filter(&store).await?;
            let id = prompt_query()?;
            commands::run(&store, &id.to_string(), &filter).await?;
        }
        MenuAction::BrowseStops => {
            let store = commands::open_store()?;
            let filter = prompt_filter(&store).await?;
            let limit: usize = Input::new()
                .with_prompt("How many stops?")
                .default(20)
                .interact_text()?;
            commands::list_stops(&store, &filter, limit).await;
        }
        MenuAction::AddStop => {
            let store = commands::open_store()?;
            let form = prompt_stop_form()?;
            commands::add_stop(&store, &form).await?;
        }
        MenuAction::ListQueries => commands::list_queries(),
        MenuAction::ImportCsv => {
            let config = StoreConfig::from_env()?;
            let path: String = Input::new()
                .with_prompt("CSV dataset")
                .default(config.csv_path.display().to_string())
                .interact_text()?;
            let inserted = commands::import(&config, Path::new(&path)).await?;
            println!("Imported {inserted} stop(s).");
        }
        MenuAction::Migrate => {
            let config = StoreConfig::from_env()?;
            commands::migrate(&config).await?;
        }
        MenuAction::StartServer => commands::serve(true).await?,
    }

    Ok(())
}

/// Sidebar filter prompts, offering the countries, genders and ages present
/// in the store.
async fn prompt_filter(store: &StoreHandle) -> Result<StopFilter, Box<dyn std::error::Error>> {
    let loaded = load_or_empty(store.records().as_ref(), &StopFilter::default()).await;
    if let Some(error) = &loaded.error {
        eprintln!("{error}");
    }
    let options = FilterOptions::from_records(&loaded.records);

    let countries = MultiSelect::new()
        .with_prompt("Countries (space=toggle, enter=confirm, none selected = all)")
        .items(&options.countries)
        .max_length(20)
        .interact()?;

    let gender_labels: Vec<&str> = options.genders.iter().map(AsRef::as_ref).collect();
    let genders = MultiSelect::new()
        .with_prompt("Genders (none selected = all)")
        .items(&gender_labels)
        .interact()?;

    let age_min: u8 = Input::new()
        .with_prompt("Youngest driver age")
        .default(options.age_min)
        .interact_text()?;
    let age_max: u8 = Input::new()
        .with_prompt("Oldest driver age")
        .default(options.age_max)
        .interact_text()?;

    Ok(StopFilter {
        countries: countries
            .into_iter()
            .map(|i| options.countries[i].clone())
            .collect(),
        genders: genders.into_iter().map(|i| options.genders[i]).collect(),
        age_range: AgeRange::new(age_min, age_max),
    })
}

fn prompt_query() -> Result<QueryId, Box<dyn std::error::Error>> {
    let labels: Vec<&str> = QueryId::all().iter().map(|id| id.title()).collect();

    let idx = Select::new()
        .with_prompt("Query")
        .items(&labels)
        .default(0)
        .max_length(20)
        .interact()?;

    Ok(QueryId::all()[idx])
}

/// Collects a new stop field by field.
///
/// # Errors
///
/// Returns an error if a prompt fails or a date or time cannot be parsed.
pub fn prompt_stop_form() -> Result<NewStopForm, Box<dyn std::error::Error>> {
    let now = Local::now().naive_local();

    let stop_date: String = Input::new()
        .with_prompt("Stop date (YYYY-MM-DD)")
        .default(now.date().format("%Y-%m-%d").to_string())
        .interact_text()?;
    let stop_time: String = Input::new()
        .with_prompt("Stop time (HH:MM:SS)")
        .default(now.time().format("%H:%M:%S").to_string())
        .interact_text()?;

    let country_name: String = Input::new().with_prompt("Country name").interact_text()?;

    let genders = DriverGender::all();
    let gender_labels: Vec<&str> = genders.iter().map(AsRef::as_ref).collect();
    let gender_idx = Select::new()
        .with_prompt("Driver gender")
        .items(&gender_labels)
        .default(0)
        .interact()?;

    let driver_age: u8 = Input::new()
        .with_prompt("Driver age")
        .default(DEFAULT_DRIVER_AGE)
        .validate_with(|age: &u8| {
            if *age <= MAX_DRIVER_AGE {
                Ok(())
            } else {
                Err(format!("Age must be at most {MAX_DRIVER_AGE}"))
            }
        })
        .interact_text()?;

    let violation_idx = Select::new()
        .with_prompt("Violation")
        .items(VIOLATION_SUGGESTIONS)
        .default(0)
        .interact()?;

    let search_conducted = Confirm::new()
        .with_prompt("Search conducted?")
        .default(false)
        .interact()?;
    let search_type: String = Input::new()
        .with_prompt("Search type (blank for none)")
        .allow_empty(true)
        .interact_text()?;

    let outcomes = StopOutcome::all();
    let outcome_labels: Vec<&str> = outcomes.iter().map(AsRef::as_ref).collect();
    let outcome_idx = Select::new()
        .with_prompt("Stop outcome")
        .items(&outcome_labels)
        .default(0)
        .interact()?;

    let is_arrested = Confirm::new()
        .with_prompt("Driver arrested?")
        .default(false)
        .interact()?;
    let stop_duration: String = Input::new()
        .with_prompt("Stop duration (e.g. 0-15 Min)")
        .allow_empty(true)
        .interact_text()?;
    let drugs_related_stop = Confirm::new()
        .with_prompt("Drug related?")
        .default(false)
        .interact()?;
    let vehicle_number: String = Input::new()
        .with_prompt("Vehicle number")
        .allow_empty(true)
        .interact_text()?;

    Ok(NewStopForm {
        country_name,
        driver_gender: genders[gender_idx],
        driver_age,
        violation: VIOLATION_SUGGESTIONS[violation_idx].to_string(),
        search_conducted,
        search_type,
        stop_outcome: outcomes[outcome_idx],
        is_arrested,
        stop_duration,
        drugs_related_stop,
        vehicle_number,
        stop_date: NaiveDate::parse_from_str(stop_date.trim(), "%Y-%m-%d")?,
        stop_time: NaiveTime::parse_from_str(stop_time.trim(), "%H:%M:%S")?,
    })
}
