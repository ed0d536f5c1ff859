use std::net::SocketAddr;

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Bearer credential sent upstream as `authorization: jwt <token>`.
    pub upstream_jwt: Option<String>,
    pub upstream_base_url: String,
    pub upstream_origin: String,
    pub upstream_user_agent: String,
    pub upstream_timeout_secs: u64,
    pub refresh_page_size: u32,
    pub refresh_batch_size: usize,
    pub refresh_max_passes: u32,
    pub refresh_batch_delay_ms: u64,
    pub refresh_pass_delay_ms: u64,
    pub refresh_chunk_size: usize,
    pub refresh_cron: String,
    pub refresh_on_startup: bool,
}

impl AppConfig {
    /// Returns the upstream bearer token, or an error naming the env var that
    /// must be set before a refresh can run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when `ZOODRO_UPSTREAM_JWT` is unset.
    pub fn require_upstream_jwt(&self) -> Result<&str, ConfigError> {
        self.upstream_jwt
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("ZOODRO_UPSTREAM_JWT".to_string()))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "upstream_jwt",
                &self.upstream_jwt.as_ref().map(|_| "[redacted]"),
            )
            .field("upstream_base_url", &self.upstream_base_url)
            .field("upstream_origin", &self.upstream_origin)
            .field("upstream_user_agent", &self.upstream_user_agent)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("refresh_page_size", &self.refresh_page_size)
            .field("refresh_batch_size", &self.refresh_batch_size)
            .field("refresh_max_passes", &self.refresh_max_passes)
            .field("refresh_batch_delay_ms", &self.refresh_batch_delay_ms)
            .field("refresh_pass_delay_ms", &self.refresh_pass_delay_ms)
            .field("refresh_chunk_size", &self.refresh_chunk_size)
            .field("refresh_cron", &self.refresh_cron)
            .field("refresh_on_startup", &self.refresh_on_startup)
            .finish()
    }
}
