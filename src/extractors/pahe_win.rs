use std::sync::OnceLock;

use anyhow::anyhow;
use regex::Regex;
use reqwest::header;
use url::Url;

/// Follows a `pahe.win` page to the locker link it points at.
pub async fn extract(client: &reqwest::Client, url: &str) -> anyhow::Result<String> {
    let html = client
        .get(url)
        .header(header::REFERER, url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    find_locker_link(&html).ok_or_else(|| anyhow!("[pahe_win] no locker link found at {url}"))
}

pub fn find_locker_link(html: &str) -> Option<String> {
    static LOCKER_LINK_RE: OnceLock<Regex> = OnceLock::new();
    LOCKER_LINK_RE
        .get_or_init(|| Regex::new(r#"https?://kwik\.[a-z]+/f/[^"'\s<]+"#).unwrap())
        .find(html)
        .map(|m| m.as_str().to_owned())
}

pub fn is_locker_url(url: &str) -> bool {
    static LOCKER_HOST_RE: OnceLock<Regex> = OnceLock::new();
    let Ok(url) = Url::parse(url) else {
        return false;
    };

    matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some_and(|host| {
            LOCKER_HOST_RE
                .get_or_init(|| {
                    Regex::new(r"(?i)^(?:[a-z0-9-]+\.)*kwik\.(?:si|cx|sx|li)$").unwrap()
                })
                .is_match(host)
        })
}
