use zoodro_core::AppConfig;

use crate::ScraperError;

/// Connection settings for [`super::VendorApiClient`].
#[derive(Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub jwt: String,
    /// Sent as `origin`; `referer` is the same value with a trailing `/`.
    pub origin: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidConfig`] when no upstream JWT is configured.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ScraperError> {
        let jwt = config
            .require_upstream_jwt()
            .map_err(|e| ScraperError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            base_url: config.upstream_base_url.clone(),
            jwt: jwt.to_string(),
            origin: config.upstream_origin.clone(),
            user_agent: config.upstream_user_agent.clone(),
            timeout_secs: config.upstream_timeout_secs,
        })
    }

    pub(crate) fn referer(&self) -> String {
        format!("{}/", self.origin.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("jwt", &"[redacted]")
            .field("origin", &self.origin)
            .field("user_agent", &self.user_agent)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
