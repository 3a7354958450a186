use std::sync::OnceLock;

use regex::Regex;

pub fn strip_line_breaks(text: &str) -> String {
    static LINE_BREAK_REGEXP: OnceLock<Regex> = OnceLock::new();
    let re = LINE_BREAK_REGEXP.get_or_init(|| Regex::new(r#"\r\n|\r|\n"#).unwrap());

    re.replace_all(text, "").into_owned()
}

pub fn sanitize_text(text: &str) -> String {
    static SANITIZE_TEXT_REGEXP: OnceLock<Regex> = OnceLock::new();
    let re = SANITIZE_TEXT_REGEXP.get_or_init(|| Regex::new(r#"[\n\t\s]+"#).unwrap());

    re.replace_all(text, " ").into_owned().trim().into()
}

/// Drops `&middot;` separators (with the char after them) from link labels.
pub fn strip_middots(text: &str) -> String {
    static MIDDOT_REGEXP: OnceLock<Regex> = OnceLock::new();
    let re = MIDDOT_REGEXP.get_or_init(|| Regex::new(r#"&middot;.?"#).unwrap());

    sanitize_text(&re.replace_all(text, ""))
}
