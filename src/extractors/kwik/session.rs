use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::{HeaderMap, SET_COOKIE};

pub const SESSION_COOKIE: &str = "kwik_session";

/// Session issued with a locker page. The exchange must present it, the token
/// is only valid for the session that fetched it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub cookie_value: Option<String>,
}

impl SessionContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let cookie_value = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(find_session_value);

        Self { cookie_value }
    }

    pub fn cookie_header(&self) -> Option<String> {
        self.cookie_value
            .as_ref()
            .map(|value| format!("{SESSION_COOKIE}={value}"))
    }
}

fn find_session_value(set_cookie: &str) -> Option<String> {
    static SESSION_RE: OnceLock<Regex> = OnceLock::new();
    SESSION_RE
        .get_or_init(|| Regex::new(r#"(?:^|[;,\s])kwik_session=(?<value>[^;,\s]+)"#).unwrap())
        .captures(set_cookie)
        .and_then(|m| Some(m.name("value")?.as_str().to_owned()))
}
