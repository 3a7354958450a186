use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use reqwest::header::{COOKIE, LOCATION, REFERER};
use url::Url;

use crate::models::ResolutionOutcome;

use super::{
    form::{FormCredentials, TOKEN_FIELD},
    session::SessionContext,
    ResolveError, Stage,
};

/// Posts the form token and reads the direct link from the answer.
///
/// Transport failures and error statuses come back as `Err` so the caller can
/// start over with a fresh page, the token being single use.
pub async fn exchange(
    client: &reqwest::Client,
    credentials: &FormCredentials,
    session: &SessionContext,
    referer: &Url,
) -> Result<ResolutionOutcome, ResolveError> {
    let mut request = client
        .post(credentials.action_url.clone())
        .header(REFERER, referer.as_str())
        .form(&[(TOKEN_FIELD, credentials.token.as_str())]);

    if let Some(cookie) = session.cookie_header() {
        request = request.header(COOKIE, cookie);
    }

    let response = request
        .send()
        .await
        .map_err(|source| ResolveError::network(Stage::Exchanging, source))?;

    let status = response.status();
    debug!(
        "[kwik] exchange at {} answered {status}",
        credentials.action_url
    );

    if status.is_redirection() {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok());

        if let Some(location) = location {
            let link = credentials
                .action_url
                .join(location)
                .map(String::from)
                .unwrap_or_else(|_| location.to_owned());
            return Ok(ResolutionOutcome::Direct(link));
        }
    }

    let body = response
        .text()
        .await
        .map_err(|source| ResolveError::network(Stage::Exchanging, source))?;

    if let Some(link) = find_media_link(&body) {
        return Ok(ResolutionOutcome::Direct(link));
    }

    if status.is_client_error() || status.is_server_error() {
        return Err(ResolveError::Rejected { status });
    }

    Ok(ResolutionOutcome::Failed(
        "no direct link in exchange response".into(),
    ))
}

pub fn find_media_link(body: &str) -> Option<String> {
    static MEDIA_LINK_RE: OnceLock<Regex> = OnceLock::new();
    MEDIA_LINK_RE
        .get_or_init(|| {
            Regex::new(r#""(?<link>https?://[^"]*\.(?:mp4|mkv|avi|mov|webm)[^"]*)""#).unwrap()
        })
        .captures(body)
        .and_then(|m| Some(m.name("link")?.as_str().to_owned()))
}
