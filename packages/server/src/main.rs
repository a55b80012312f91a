#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Police log API server binary.
//!
//! Runs interactively when started with `--interactive` (or `-i`),
//! otherwise reads its configuration from the environment.

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if std::env::args().skip(1).any(|a| a == "--interactive" || a == "-i") {
        police_log_server::interactive::run().await
    } else {
        police_log_server::run_server().await
    }
}
