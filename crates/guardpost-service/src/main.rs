//! # Guardpost Service
//!
//! Binary entry point for the Guardpost HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Selects the hosted backend (or a fail-closed stand-in)
//! - Starts the HTTP server from guardpost-api

mod bootstrap;

use guardpost_api::{
    config::LoggingConfig, start_server, AcknowledgingHandler, AppState, ServiceError,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let loaded = bootstrap::load_config();

    // Logging follows the loaded configuration; a broken configuration is
    // reported through the default subscriber.
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    bootstrap::init_logging(&logging);

    info!("Starting Guardpost Service");

    let service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    for requirement in service_config.required_secrets() {
        if !requirement.present {
            error!(secret = requirement.name, "Required secret is not configured");
        }
    }

    let backends = match bootstrap::build_backends(&service_config) {
        Ok(backends) => backends,
        Err(e) => {
            error!(error = %e, "Failed to configure hosted backend; aborting");
            std::process::exit(3);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        endpoint = %service_config.webhook.endpoint_path,
        "Starting HTTP server"
    );

    let result = match AppState::new(service_config, backends, Arc::new(AcknowledgingHandler)) {
        Ok(state) => start_server(state).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("Failed to run server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }
}
