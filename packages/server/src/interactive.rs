//! Interactive mode for the server.
//!
//! Prompts for the record store backend, bind address and port before
//! starting the server.

use dialoguer::{Confirm, Input, Select};

const BACKENDS: &[&str] = &["file", "database"];

/// Runs the server in interactive mode, prompting for configuration.
///
/// Sets `POLICE_LOG_BACKEND`, `POLICE_LOG_CSV` (file backend only),
/// `BIND_ADDR` and `PORT`, then delegates to [`super::run_server`].
///
/// # Errors
///
/// Returns an `std::io::Result` error if the underlying server fails to
/// start.
#[allow(clippy::future_not_send)]
pub async fn run() -> std::io::Result<()> {
    println!("Police Log Server");
    println!();

    let backend = Select::new()
        .with_prompt("Record store")
        .items(BACKENDS)
        .default(0)
        .interact()
        .map_or(BACKENDS[0], |i| BACKENDS[i]);

    let csv_path = (backend == "file").then(|| {
        Input::<String>::new()
            .with_prompt("CSV dataset")
            .default(police_log_store::config::DEFAULT_CSV_PATH.to_string())
            .interact_text()
            .unwrap_or_else(|_| police_log_store::config::DEFAULT_CSV_PATH.to_string())
    });

    let bind_addr: String = Input::new()
        .with_prompt("Bind address")
        .default("127.0.0.1".to_string())
        .interact_text()
        .unwrap_or_else(|_| "127.0.0.1".to_string());

    let port_str: String = Input::new()
        .with_prompt("Port")
        .default("8080".to_string())
        .interact_text()
        .unwrap_or_else(|_| "8080".to_string());

    // SAFETY: We are single-threaded at this point (before server starts) and
    // these variables are only read once during server initialisation.
    unsafe {
        std::env::set_var("POLICE_LOG_BACKEND", backend);
        if let Some(path) = &csv_path {
            std::env::set_var("POLICE_LOG_CSV", path);
        }
        std::env::set_var("BIND_ADDR", &bind_addr);
        std::env::set_var("PORT", &port_str);
    }

    if !Confirm::new()
        .with_prompt(format!(
            "Start server on {bind_addr}:{port_str} with the {backend} backend?"
        ))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server().await
}
