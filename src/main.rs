use std::net::TcpListener;

use fitness_app::configuration::get_configuration;
use fitness_app::startup::{run, spawn_expired_token_sweeper, AppState};
use fitness_app::telemetry::init_telemetry;

fn startup_error(kind: std::io::ErrorKind, message: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(kind, message.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry().map_err(|e| startup_error(std::io::ErrorKind::Other, e))?;

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!(error = %e, "Failed to read configuration");
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    configuration.jwt.validate().map_err(|e| {
        tracing::error!(error = %e, "Invalid JWT configuration");
        startup_error(std::io::ErrorKind::InvalidInput, e)
    })?;

    let state = AppState::build(&configuration).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialise storage");
        startup_error(std::io::ErrorKind::ConnectionRefused, "Storage initialisation error")
    })?;

    let sweep_every = configuration.application.purge_interval();
    spawn_expired_token_sweeper(state.tokens.clone(), sweep_every);
    tracing::info!(interval_seconds = sweep_every.as_secs(), "Expired token sweeper started");

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!(address = %address, "Server listening");

    run(listener, state)?.await
}
