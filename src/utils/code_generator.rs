//! Short code generation and syntactic validation.

use rand::{Rng, distr::Alphanumeric};
use regex::Regex;
use std::sync::LazyLock;

/// Default length of generated codes. 62^11 ≈ 5.2e19 possible codes.
pub const DEFAULT_CODE_LENGTH: usize = 11;

/// Longest short id the redirector accepts.
pub const MAX_SHORT_ID_LENGTH: usize = 20;

/// Characters a short id may contain. Generated codes only use the alphanumeric subset.
static SHORT_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex is valid"));

/// Generates a random alphanumeric short code of `length` characters.
///
/// Uses the thread-local CSPRNG, so codes are not guessable from earlier ones.
///
/// # Examples
///
/// ```ignore
/// let code = generate_code(11);
/// assert_eq!(code.len(), 11);
/// assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_code(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Checks a short id before any cache round trip.
///
/// # Rules
///
/// - Length: 1 to [`MAX_SHORT_ID_LENGTH`] characters
/// - Allowed characters: ASCII letters, digits, `-` and `_`
pub fn is_valid_short_id(short_id: &str) -> bool {
    !short_id.is_empty()
        && short_id.len() <= MAX_SHORT_ID_LENGTH
        && SHORT_ID_REGEX.is_match(short_id)
}
