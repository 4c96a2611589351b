//! Startup wiring: configuration loading, logging and backend selection.

use guardpost_api::{config::LoggingConfig, Backends, ConfigError, ServiceConfig};
use guardpost_core::{BackendClient, BackendConfig, UnconfiguredBackend};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_VAR: &str = "GP_CONFIG_FILE";

/// Prefix of configuration environment variables (`GP__SERVER__PORT`, ...)
pub const ENV_PREFIX: &str = "GP";

/// Load, complete and validate the service configuration.
///
/// Sources (applied in order, later sources override earlier ones):
///  1. /etc/guardpost/service.yaml   (system-wide defaults)
///  2. ./config/service.yaml         (deployment-local override)
///  3. Path given by GP_CONFIG_FILE  (operator-specified file, must exist)
///  4. Environment variables prefixed GP__ (double-underscore separator),
///     e.g. GP__SERVER__PORT=9090 sets server.port = 9090
///
/// The platform variables (`TWILIO_AUTH_TOKEN`, `SUPABASE_URL`, ...) then fill
/// whatever is still unset.
pub fn load_config() -> Result<ServiceConfig, ConfigError> {
    let explicit_path = std::env::var(CONFIG_FILE_VAR)
        .ok()
        .filter(|p| !p.is_empty());

    let environment = config::Environment::with_prefix(ENV_PREFIX).separator("__");
    let mut service_config = build_config(explicit_path.as_deref(), environment)?;

    service_config.apply_platform_env(|name| std::env::var(name).ok());
    service_config.validate()?;

    Ok(service_config)
}

/// Layer the configuration sources and deserialize the result.
pub fn build_config(
    explicit_path: Option<&str>,
    environment: config::Environment,
) -> Result<ServiceConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/guardpost/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(path) = explicit_path {
        builder = builder.add_source(
            config::File::with_name(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    builder
        .add_source(environment)
        .build()
        .and_then(|c| c.try_deserialize::<ServiceConfig>())
        .map_err(|e| ConfigError::Load {
            message: e.to_string(),
        })
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level.
pub fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "guardpost={0},guardpost_service={0},guardpost_api={0},guardpost_core={0},\
             tower_http={0}",
            logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Pick the hosted backend, or a fail-closed stand-in when it is not configured.
pub fn build_backends(config: &ServiceConfig) -> Result<Backends, ConfigError> {
    let settings = &config.backend;

    let Some(url) = settings.url.as_deref().filter(|_| settings.is_configured()) else {
        warn!(
            "Hosted backend is not configured; signed URLs and candidate lookups will fail"
        );
        return Ok(Backends::shared(UnconfiguredBackend));
    };

    let client = BackendClient::new(BackendConfig {
        url: url.to_string(),
        service_role_key: settings.service_role_key.clone(),
        request_timeout: settings.request_timeout(),
        guards_table: settings.guards_table.clone(),
    })
    .map_err(|e| ConfigError::Invalid {
        message: e.to_string(),
    })?;

    info!(
        timeout_seconds = settings.request_timeout_seconds,
        "Hosted backend client configured"
    );
    Ok(Backends::shared(client))
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;
