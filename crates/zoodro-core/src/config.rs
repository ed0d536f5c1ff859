use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_UPSTREAM_BASE_URL: &str = "https://foodro-api.snappfood.ir";
const DEFAULT_UPSTREAM_ORIGIN: &str = "https://foodro.snappfood.ir";
const DEFAULT_UPSTREAM_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("ZOODRO_ENV", "development"));
    let bind_addr = parse_addr("ZOODRO_BIND_ADDR", "0.0.0.0:8080")?;
    let log_level = or_default("ZOODRO_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("ZOODRO_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("ZOODRO_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("ZOODRO_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let upstream_jwt = lookup("ZOODRO_UPSTREAM_JWT")
        .ok()
        .filter(|token| !token.trim().is_empty());
    let upstream_base_url = or_default("ZOODRO_UPSTREAM_BASE_URL", DEFAULT_UPSTREAM_BASE_URL);
    let upstream_origin = or_default("ZOODRO_UPSTREAM_ORIGIN", DEFAULT_UPSTREAM_ORIGIN);
    let upstream_user_agent =
        or_default("ZOODRO_UPSTREAM_USER_AGENT", DEFAULT_UPSTREAM_USER_AGENT);
    let upstream_timeout_secs = parse_u64("ZOODRO_UPSTREAM_TIMEOUT_SECS", "10")?;

    let refresh_page_size = parse_u32("ZOODRO_REFRESH_PAGE_SIZE", "20")?;
    let refresh_batch_size = parse_usize("ZOODRO_REFRESH_BATCH_SIZE", "50")?;
    let refresh_max_passes = parse_u32("ZOODRO_REFRESH_MAX_PASSES", "15")?;
    let refresh_batch_delay_ms = parse_u64("ZOODRO_REFRESH_BATCH_DELAY_MS", "100")?;
    let refresh_pass_delay_ms = parse_u64("ZOODRO_REFRESH_PASS_DELAY_MS", "1000")?;
    let refresh_chunk_size = parse_usize("ZOODRO_REFRESH_CHUNK_SIZE", "200")?;
    let refresh_cron = or_default("ZOODRO_REFRESH_CRON", "0 0 */6 * * *");
    let refresh_on_startup = parse_bool("ZOODRO_REFRESH_ON_STARTUP", "false")?;

    for (var, value) in [
        ("ZOODRO_REFRESH_PAGE_SIZE", refresh_page_size as usize),
        ("ZOODRO_REFRESH_BATCH_SIZE", refresh_batch_size),
        ("ZOODRO_REFRESH_CHUNK_SIZE", refresh_chunk_size),
    ] {
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        upstream_jwt,
        upstream_base_url,
        upstream_origin,
        upstream_user_agent,
        upstream_timeout_secs,
        refresh_page_size,
        refresh_batch_size,
        refresh_max_passes,
        refresh_batch_delay_ms,
        refresh_pass_delay_ms,
        refresh_chunk_size,
        refresh_cron,
        refresh_on_startup,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
