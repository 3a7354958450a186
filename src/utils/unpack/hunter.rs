//! Decoder for the `eval(function(h,u,n,t,e,r){...}(...))` script obfuscation.
//!
//! The packed call carries four interesting literals: the encoded string, the
//! page specific alphabet key, an offset and a numeric base. Every character of
//! the original text is written as base `base` digits of `code + offset`, digit
//! `j` being spelled with the `j`-th symbol of the key, and characters are joined
//! with the key symbol at position `base`.

use std::{collections::HashMap, sync::OnceLock};

use log::debug;
use regex::Regex;
use thiserror::Error;

use super::base::{self, ALPHABET_64};
use crate::utils::text;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedPayload {
    pub encoded: String,
    pub alphabet_key: String,
    pub offset: u32,
    pub base: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported base {0}")]
    UnsupportedBase(u32),
    #[error("segment {segment} has no digits of base {base}")]
    UnparseableSegment { segment: usize, base: u32 },
    #[error("segment {segment} decodes to invalid char code {value}")]
    InvalidCharCode { segment: usize, value: u64 },
}

pub fn detect(source: &str) -> bool {
    source
        .replace(' ', "")
        .contains("eval(function(h,u,n,t,e,r)")
}

struct Juicer {
    name: &'static str,
    regex: Regex,
}

/// Invocation syntaxes seen in the wild, most specific first.
/// New variants go to the end of the list.
fn juicers() -> &'static [Juicer] {
    static JUICERS: OnceLock<Vec<Juicer>> = OnceLock::new();
    JUICERS.get_or_init(|| {
        [
            (
                "eval call",
                r#"eval\(function\(h,u,n,t,e,r\)\{.*?\("(?<encoded>[^"]+)",\d+,"(?<key>[^"]+)",(?<offset>\d+),(?<base>\d+),\d+\)\)"#,
            ),
            (
                "spaced args",
                r#"\(\s*"(?<encoded>[^",]*)"\s*,\s*\d+\s*,\s*"(?<key>[^",]*)"\s*,\s*(?<offset>\d+)\s*,\s*(?<base>\d+)\s*,\s*\d+[a-zA-Z]?\s*\)"#,
            ),
            (
                "mixed quotes",
                r#"\(\s*['"](?<encoded>[^'",]*)['"]\s*,\s*\d+\s*,\s*['"](?<key>[^'",]*)['"]\s*,\s*(?<offset>\d+)\s*,\s*(?<base>\d+)\s*,\s*\d+[a-zA-Z]?\s*\)"#,
            ),
        ]
        .into_iter()
        .map(|(name, re)| Juicer {
            name,
            regex: Regex::new(re).unwrap(),
        })
        .collect()
    })
}

/// Finds the packed call in page text. Line breaks are ignored.
pub fn locate(source: &str) -> Option<PackedPayload> {
    let source = text::strip_line_breaks(source);

    for juicer in juicers() {
        let maybe_payload = juicer.regex.captures(&source).and_then(|caps| {
            Some(PackedPayload {
                encoded: caps.name("encoded")?.as_str().to_owned(),
                alphabet_key: caps.name("key")?.as_str().to_owned(),
                offset: caps.name("offset")?.as_str().parse().ok()?,
                base: caps.name("base")?.as_str().parse().ok()?,
            })
        });

        if let Some(payload) = maybe_payload {
            debug!("[hunter] payload matched by {}", juicer.name);
            return Some(payload);
        }
    }

    if detect(&source) {
        debug!("[hunter] packed script present but its arguments are not recognized");
    }

    None
}

pub fn decode(payload: &PackedPayload) -> Result<String, DecodeError> {
    let digits =
        base::alphabet(payload.base).map_err(|_| DecodeError::UnsupportedBase(payload.base))?;
    let key: Vec<char> = payload.alphabet_key.chars().collect();
    let separator = key.get(payload.base as usize).copied();

    payload
        .encoded
        .split(|ch: char| Some(ch) == separator)
        .enumerate()
        .filter(|(_, segment)| !segment.is_empty())
        .map(|(idx, segment)| decode_segment(idx, segment, &key, digits, payload))
        .collect()
}

fn decode_segment(
    idx: usize,
    segment: &str,
    key: &[char],
    digits: &str,
    payload: &PackedPayload,
) -> Result<char, DecodeError> {
    let unparseable = DecodeError::UnparseableSegment {
        segment: idx,
        base: payload.base,
    };

    let substituted = substitute_chars(segment, key);
    if !substituted.chars().any(|ch| digits.contains(ch)) {
        return Err(unparseable);
    }

    let value = base::to_integer(&substituted, digits).map_err(|_| unparseable)?;

    value
        .checked_sub(payload.offset as u64)
        .and_then(|code| u32::try_from(code).ok())
        .and_then(char::from_u32)
        .ok_or(DecodeError::InvalidCharCode {
            segment: idx,
            value,
        })
}

/// Maps every key symbol onto the digit symbol of its position in one pass, so
/// emitted digits are never rewritten. A symbol repeated in the key keeps its
/// first position. Positions below 10 become their decimal digit.
pub fn substitute(segment: &str, alphabet_key: &str) -> String {
    let key: Vec<char> = alphabet_key.chars().collect();
    substitute_chars(segment, &key)
}

fn substitute_chars(segment: &str, key: &[char]) -> String {
    let mut digit_of: HashMap<char, char> = HashMap::with_capacity(key.len());
    for (from, to) in key.iter().copied().zip(ALPHABET_64.chars()) {
        digit_of.entry(from).or_insert(to);
    }

    segment
        .chars()
        .map(|ch| digit_of.get(&ch).copied().unwrap_or(ch))
        .collect()
}

#[cfg(test)]
pub(crate) fn encode(text: &str, alphabet_key: &str, offset: u32, base: u32) -> String {
    let key: Vec<char> = alphabet_key.chars().collect();
    let digits = base::alphabet(base).unwrap();
    let separator = key[base as usize].to_string();

    text.chars()
        .map(|ch| {
            base::from_integer(ch as u64 + offset as u64, base, digits)
                .unwrap()
                .chars()
                .map(|d| key[digits.find(d).unwrap()])
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(&separator)
}
