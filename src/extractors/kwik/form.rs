use std::sync::OnceLock;

use regex::Regex;
use scraper::Selector;
use url::Url;

pub const TOKEN_FIELD: &str = "_token";

/// Target and token of the download form hidden in a locker page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormCredentials {
    pub action_url: Url,
    pub token: String,
}

/// Reads the form from decoded markup. Both an absolute action url and a
/// non-empty token are required.
pub fn extract(markup: &str) -> Option<FormCredentials> {
    from_document(markup).or_else(|| from_raw_text(markup))
}

fn from_document(markup: &str) -> Option<FormCredentials> {
    static FORM_SELECTOR: OnceLock<Selector> = OnceLock::new();
    static TOKEN_SELECTOR: OnceLock<Selector> = OnceLock::new();
    let form_selector = FORM_SELECTOR.get_or_init(|| Selector::parse("form[action]").unwrap());
    let token_selector =
        TOKEN_SELECTOR.get_or_init(|| Selector::parse(r#"input[name="_token"]"#).unwrap());

    let document = scraper::Html::parse_fragment(markup);
    let form = document.select(form_selector).next()?;

    let token = form
        .select(token_selector)
        .next()
        .or_else(|| document.select(token_selector).next())?
        .attr("value")?;

    credentials(form.attr("action")?, token)
}

/// Markup embedded in script strings does not always survive html parsing.
fn from_raw_text(markup: &str) -> Option<FormCredentials> {
    static ACTION_RE: OnceLock<Regex> = OnceLock::new();
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

    let action = ACTION_RE
        .get_or_init(|| Regex::new(r#"action\s*=\s*\\?["'](?<action>[^"'\\]+)\\?["']"#).unwrap())
        .captures(markup)
        .and_then(|m| Some(m.name("action")?.as_str()))?;

    let token = TOKEN_RE
        .get_or_init(|| {
            Regex::new(r#"name\s*=\s*\\?["']_token\\?["'][^>]*?value\s*=\s*\\?["'](?<token>[^"'\\]*)\\?["']"#)
                .unwrap()
        })
        .captures(markup)
        .and_then(|m| Some(m.name("token")?.as_str()))?;

    credentials(action, token)
}

fn credentials(action: &str, token: &str) -> Option<FormCredentials> {
    let action_url = Url::parse(action.trim()).ok()?;
    if !matches!(action_url.scheme(), "http" | "https") || token.is_empty() {
        return None;
    }

    Some(FormCredentials {
        action_url,
        token: token.to_owned(),
    })
}
