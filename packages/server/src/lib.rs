#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the police log.
//!
//! Serves the stop records, the sidebar filter options, the new-stop form
//! and the analytics query catalog as a JSON REST API. The record store
//! backend (CSV file or database) is selected from the environment at
//! startup.

mod handlers;
pub mod interactive;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use police_log_analytics::{QueryEngine, engine_for};
use police_log_store::{StoreConfig, StoreError, StoreHandle};

/// Shared application state.
pub struct AppState {
    /// Opened record store.
    pub store: StoreHandle,
    /// Query engine matching the store backend.
    pub engine: Arc<dyn QueryEngine>,
}

impl AppState {
    /// Wraps an opened store and picks its query engine.
    #[must_use]
    pub fn new(store: StoreHandle) -> Self {
        let engine = engine_for(&store);
        Self { store, engine }
    }

    /// Opens the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be opened.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self::new(StoreHandle::open(config)?))
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/filters", web::get().to(handlers::filters))
            .route("/form-options", web::get().to(handlers::form_options))
            .route("/stops", web::get().to(handlers::stops))
            .route("/stops", web::post().to(handlers::submit_stop))
            .route("/queries", web::get().to(handlers::queries))
            .route("/queries/{id}", web::get().to(handlers::run_query)),
    );
}

/// Starts the police log API server.
///
/// Reads the store configuration from the environment, opens the store and
/// starts the Actix-Web HTTP server. The caller provides the async runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the store cannot be opened, or if
/// the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    if pretty_env_logger::try_init_custom_env("RUST_LOG").is_err() {
        log::debug!("Logger already initialized");
    }

    let state = StoreConfig::from_env()
        .and_then(|config| AppState::open(&config))
        .map_err(|e| {
            log::error!("Failed to open record store: {e}");
            std::io::Error::other(e.to_string())
        })?;
    log::info!(
        "Serving {} records with the {} engine",
        state.store.backend(),
        state.engine.name()
    );
    let state = web::Data::new(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
