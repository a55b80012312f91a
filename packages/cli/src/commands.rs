//! Actions shared by the subcommands and the interactive menu.

use std::path::Path;

use police_log_analytics::{engine_for, parse_query_id, run_query};
use police_log_analytics_models::QueryId;
use police_log_stop_models::{NewStopForm, StopFilter};
use police_log_store::{
    CsvStore, RecordStore as _, SqlStore, StoreBackend, StoreConfig, StoreHandle, load_or_empty,
};

use crate::render;

/// Opens the store selected by the environment.
pub fn open_store() -> Result<StoreHandle, Box<dyn std::error::Error>> {
    let config = StoreConfig::from_env()?;
    Ok(StoreHandle::open(&config)?)
}

/// Prints every catalog query.
pub fn list_queries() {
    println!("{:<34} TITLE", "ID");
    println!("{}", "-".repeat(100));
    for id in QueryId::all() {
        println!("{:<34} {}", id.to_string(), id.title());
    }
}

/// Runs catalog query `id` and prints its table and chart.
pub async fn run(
    store: &StoreHandle,
    id: &str,
    filter: &StopFilter,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = parse_query_id(id)?;
    let engine = engine_for(store);
    let result = run_query(engine.as_ref(), id, filter).await?;
    print!("{}", render::query_result(&result));
    Ok(())
}

/// Prints up to `limit` filtered stops.
pub async fn list_stops(store: &StoreHandle, filter: &StopFilter, limit: usize) {
    let loaded = load_or_empty(store.records().as_ref(), filter).await;
    if let Some(error) = &loaded.error {
        eprintln!("{error}");
    }

    let total = loaded.records.len();
    let shown = &loaded.records[..total.min(limit)];
    print!("{}", render::stops(shown));
    println!("\n{} of {total} stop(s)", shown.len());
}

/// Appends the submitted stop and prints its narrative.
pub async fn add_stop(
    store: &StoreHandle,
    form: &NewStopForm,
) -> Result<(), Box<dyn std::error::Error>> {
    let record = form.to_record()?;
    store.records().append(record).await?;

    if store.backend() == StoreBackend::File {
        log::warn!("The file backend keeps new stops for this session only");
    }

    println!("Stop log added.");
    println!();
    println!("{}", form.narrative());
    Ok(())
}

/// Bulk-loads the CSV dataset at `csv_path` into the configured database.
pub async fn import(
    config: &StoreConfig,
    csv_path: &Path,
) -> Result<u64, Box<dyn std::error::Error>> {
    let source = CsvStore::open(csv_path)?;
    let records = source.load_all().await?;
    log::info!(
        "Importing {} record(s) from {} into {}",
        records.len(),
        csv_path.display(),
        config.database.dialect()
    );

    let store = SqlStore::new(config.database.clone());
    let inserted = store.append_many(&records).await?;
    log::info!("Import complete: {inserted} record(s) inserted");
    Ok(inserted)
}

/// Ensures the `traffic_stops` table exists in the configured database.
pub async fn migrate(config: &StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Ensuring schema on {}...", config.database.dialect());
    SqlStore::new(config.database.clone()).connect().await?;
    log::info!("Schema ready.");
    Ok(())
}

/// Starts the API server on a dedicated actix runtime.
pub async fn serve(interactive: bool) -> Result<(), Box<dyn std::error::Error>> {
    // actix-web needs its own system; running it on the blocking pool
    // avoids nesting it inside the tokio runtime.
    tokio::task::spawn_blocking(move || {
        actix_web::rt::System::new().block_on(async move {
            if interactive {
                police_log_server::interactive::run().await
            } else {
                police_log_server::run_server().await
            }
        })
    })
    .await??;
    Ok(())
}
