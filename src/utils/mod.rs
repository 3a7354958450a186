pub mod dns_over_https;
pub mod text;
pub mod unpack;

use std::sync::Arc;

use dns_over_https::DoHResolver;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    redirect, ClientBuilder,
};

use crate::config::ResolverConfig;

pub fn get_user_agent<'a>() -> &'a str {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36"
}

/// Client for catalog pages. Keeps a cookie jar for the anti-bot cookies.
pub fn create_page_client(config: &ResolverConfig) -> reqwest::Result<reqwest::Client> {
    let mut headers = get_default_headers();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );

    create_client_builder(config)
        .default_headers(headers)
        .cookie_store(true)
        .build()
}

/// Client for locker pages and token exchange.
///
/// Redirects are not followed since the exchange answers with the direct link
/// in `Location`, and there is no cookie jar: the session cookie belongs to a
/// single resolution and is attached by hand.
pub fn create_locker_client(config: &ResolverConfig) -> reqwest::Result<reqwest::Client> {
    let mut headers = get_default_headers();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );

    create_client_builder(config)
        .default_headers(headers)
        .redirect(redirect::Policy::none())
        .build()
}

pub fn create_client_builder(config: &ResolverConfig) -> reqwest::ClientBuilder {
    let builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout())
        .read_timeout(config.read_timeout())
        .user_agent(config.user_agent.as_str())
        .danger_accept_invalid_certs(true);

    if config.dns_over_https {
        builder.dns_resolver(Arc::new(DoHResolver::default()))
    } else {
        builder
    }
}

pub fn get_default_headers() -> HeaderMap {
    let mut headers = HeaderMap::default();

    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers
}
