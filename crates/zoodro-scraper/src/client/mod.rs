use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, ORIGIN, REFERER};
use reqwest::Client;
use zoodro_core::{VendorDetail, VendorSummary};

use crate::error::ScraperError;
use crate::source::VendorSource;
use crate::types::VendorPageResponse;

mod config;

pub use config::UpstreamConfig;

const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Longest response body excerpt kept in [`ScraperError::UnexpectedStatus`].
const ERROR_BODY_LIMIT: usize = 512;

/// HTTP client for the upstream vendor API.
///
/// Every request carries the JWT, `accept`, `origin`, `referer` and
/// `user-agent` headers configured at construction. Non-2xx responses are
/// returned as [`ScraperError::UnexpectedStatus`] and never retried here;
/// the refresh pipeline owns retry policy.
#[derive(Debug, Clone)]
pub struct VendorApiClient {
    client: Client,
    base_url: String,
}

impl VendorApiClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidConfig`] if a header value contains
    /// characters HTTP does not allow, or [`ScraperError::Http`] if the
    /// underlying `reqwest::Client` cannot be constructed.
    pub fn new(config: &UpstreamConfig) -> Result<Self, ScraperError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut auth = header_value("authorization", &format!("jwt {}", config.jwt))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ORIGIN, header_value("origin", &config.origin)?);
        headers.insert(REFERER, header_value("referer", &config.referer())?);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn list_url(base_url: &str, page_number: u32, page_size: u32) -> String {
        format!("{base_url}/CustomerVendor/GetHomePageList?pageNumber={page_number}&pageSize={page_size}")
    }

    fn detail_url(base_url: &str, vendor_id: i64) -> String {
        format!("{base_url}/CustomerVendor/GetVendorDetail?vendorID={vendor_id}")
    }

    /// Sends a GET and returns the body of a 2xx response.
    async fn get_body(&self, url: &str) -> Result<String, ScraperError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = excerpt(&body);
            tracing::warn!(status = status.as_u16(), url, body, "upstream returned non-success status");
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
                body,
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl VendorSource for VendorApiClient {
    /// # Errors
    ///
    /// - [`ScraperError::UnexpectedStatus`] for any non-2xx status.
    /// - [`ScraperError::Http`] on network or timeout failure.
    /// - [`ScraperError::Deserialize`] if the body is not a listing page.
    async fn list_page(
        &self,
        page_number: u32,
        page_size: u32,
    ) -> Result<Vec<VendorSummary>, ScraperError> {
        let url = Self::list_url(&self.base_url, page_number, page_size);
        let body = self.get_body(&url).await?;

        let page = serde_json::from_str::<VendorPageResponse>(&body).map_err(|source| {
            ScraperError::Deserialize {
                context: format!("vendor listing page {page_number}"),
                source,
            }
        })?;

        Ok(page.into_vendors())
    }

    /// A 2xx body that is valid JSON but not an object is logged and still
    /// returned; callers must not assume a returned detail is well-formed.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::UnexpectedStatus`] for any non-2xx status.
    /// - [`ScraperError::Http`] on network or timeout failure.
    /// - [`ScraperError::Deserialize`] if the body is not JSON at all.
    async fn fetch_detail(&self, vendor_id: i64) -> Result<VendorDetail, ScraperError> {
        let url = Self::detail_url(&self.base_url, vendor_id);
        let body = self.get_body(&url).await?;

        let detail = serde_json::from_str::<VendorDetail>(&body).map_err(|source| {
            ScraperError::Deserialize {
                context: format!("vendor detail {vendor_id}"),
                source,
            }
        })?;

        if !detail.is_object() {
            tracing::warn!(vendor_id, "vendor detail payload is not a JSON object");
        }

        Ok(detail)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ScraperError> {
    HeaderValue::from_str(value)
        .map_err(|e| ScraperError::InvalidConfig(format!("{name} header: {e}")))
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_owned(),
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
