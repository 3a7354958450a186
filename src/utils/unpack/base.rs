use thiserror::Error;

/// Digit symbols of every supported base, lowest value first.
/// A base `n` alphabet is the first `n` symbols.
pub const ALPHABET_64: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ+/";

pub const MIN_BASE: u32 = 2;
pub const MAX_BASE: u32 = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BaseError {
    #[error("unsupported base {0} (expected 2..=64)")]
    UnsupportedBase(u32),
    #[error("alphabet has {len} symbols, base {base} needs more")]
    AlphabetTooShort { base: u32, len: usize },
    #[error("value does not fit into 64 bits")]
    Overflow,
}

/// Working alphabet for `base`: a prefix of [`ALPHABET_64`].
pub fn alphabet(base: u32) -> Result<&'static str, BaseError> {
    check_base(base)?;
    // ALPHABET_64 is ascii, byte offsets are char offsets
    Ok(&ALPHABET_64[..base as usize])
}

/// Reads `text` as big-endian digits over `alphabet`.
///
/// The position of a symbol in `alphabet` is its value and the alphabet length
/// is the base. Symbols missing from the alphabet are skipped.
pub fn to_integer(text: &str, alphabet: &str) -> Result<u64, BaseError> {
    let digits: Vec<char> = alphabet.chars().collect();
    let base = digits.len() as u32;
    check_base(base)?;

    text.chars()
        .filter_map(|ch| digits.iter().position(|&d| d == ch))
        .try_fold(0u64, |acc, digit| {
            acc.checked_mul(base as u64)
                .and_then(|acc| acc.checked_add(digit as u64))
                .ok_or(BaseError::Overflow)
        })
}

/// Writes `value` using the first `base` symbols of `alphabet`.
pub fn from_integer(mut value: u64, base: u32, alphabet: &str) -> Result<String, BaseError> {
    check_base(base)?;

    let digits: Vec<char> = alphabet.chars().take(base as usize).collect();
    if digits.len() < base as usize {
        return Err(BaseError::AlphabetTooShort {
            base,
            len: digits.len(),
        });
    }

    if value == 0 {
        return Ok(digits[0].to_string());
    }

    let mut result = Vec::new();
    while value > 0 {
        result.push(digits[(value % base as u64) as usize]);
        value /= base as u64;
    }

    Ok(result.into_iter().rev().collect())
}

fn check_base(base: u32) -> Result<(), BaseError> {
    if (MIN_BASE..=MAX_BASE).contains(&base) {
        Ok(())
    } else {
        Err(BaseError::UnsupportedBase(base))
    }
}
