use super::*;

fn config() -> UpstreamConfig {
    UpstreamConfig {
        base_url: "https://api.example.test/".to_string(),
        jwt: "token".to_string(),
        origin: "https://web.example.test".to_string(),
        user_agent: "zoodro-test/0.1".to_string(),
        timeout_secs: 5,
    }
}

#[test]
fn list_url_carries_page_parameters() {
    assert_eq!(
        VendorApiClient::list_url("https://api.example.test", 3, 20),
        "https://api.example.test/CustomerVendor/GetHomePageList?pageNumber=3&pageSize=20"
    );
}

#[test]
fn detail_url_carries_vendor_id() {
    assert_eq!(
        VendorApiClient::detail_url("https://api.example.test", 7781),
        "https://api.example.test/CustomerVendor/GetVendorDetail?vendorID=7781"
    );
}

#[test]
fn new_trims_trailing_slash_from_base_url() {
    let client = VendorApiClient::new(&config()).expect("client");
    assert_eq!(client.base_url, "https://api.example.test");
}

#[test]
fn new_rejects_header_unsafe_token() {
    let mut cfg = config();
    cfg.jwt = "bad\ntoken".to_string();
    let err = VendorApiClient::new(&cfg).unwrap_err();
    assert!(
        matches!(err, ScraperError::InvalidConfig(ref msg) if msg.starts_with("authorization")),
        "expected InvalidConfig, got: {err:?}"
    );
}

#[test]
fn referer_is_origin_with_trailing_slash() {
    assert_eq!(config().referer(), "https://web.example.test/");
    let mut cfg = config();
    cfg.origin = "https://web.example.test/".to_string();
    assert_eq!(cfg.referer(), "https://web.example.test/");
}

#[test]
fn debug_redacts_jwt() {
    let rendered = format!("{:?}", config());
    assert!(rendered.contains("[redacted]"));
    assert!(!rendered.contains("token"));
}

#[test]
fn excerpt_truncates_long_bodies_on_char_boundary() {
    let long = "ب".repeat(ERROR_BODY_LIMIT + 10);
    let cut = excerpt(&long);
    assert!(cut.ends_with("..."));
    assert_eq!(cut.chars().count(), ERROR_BODY_LIMIT + 3);
    assert_eq!(excerpt("short"), "short");
}
