//! `upstream` command handlers: one-off requests against the vendor API.

use clap::Subcommand;
use zoodro_scraper::{UpstreamConfig, VendorApiClient, VendorSource};

#[derive(Debug, Subcommand)]
pub enum UpstreamCommands {
    /// Fetch one listing page and print its vendors
    Page {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        size: u32,
    },
    /// Fetch one vendor's detail payload and print it as JSON
    Detail { vendor_id: i64 },
}

fn client(config: &zoodro_core::AppConfig) -> anyhow::Result<VendorApiClient> {
    Ok(VendorApiClient::new(&UpstreamConfig::from_app_config(config)?)?)
}

/// # Errors
///
/// Returns an error if the upstream is not configured or the request fails.
pub(crate) async fn run_upstream_page(
    config: &zoodro_core::AppConfig,
    page: u32,
    size: u32,
) -> anyhow::Result<()> {
    let vendors = client(config)?.list_page(page, size).await?;

    if vendors.is_empty() {
        println!("page {page} is empty (end of listing)");
        return Ok(());
    }

    println!("{:<10}{:>6}{:>11}{:>11}  TITLE", "ID", "OFF", "LAT", "LNG");
    for vendor in &vendors {
        println!(
            "{:<10}{:>6}{:>11.5}{:>11.5}  {}",
            vendor.id,
            zoodro_core::truncate_percent(vendor.max_offer_percent),
            vendor.latitude,
            vendor.longitude,
            vendor.title
        );
    }
    println!("{} vendor(s) on page {page}", vendors.len());

    Ok(())
}

/// # Errors
///
/// Returns an error if the upstream is not configured or the request fails.
pub(crate) async fn run_upstream_detail(
    config: &zoodro_core::AppConfig,
    vendor_id: i64,
) -> anyhow::Result<()> {
    let detail = client(config)?.fetch_detail(vendor_id).await?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}
