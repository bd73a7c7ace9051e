//! URL normalization for incoming long URLs.
//!
//! Bare domains get `http://` prepended before validation; the result must be
//! an absolute HTTP or HTTPS URL with a host.

use std::borrow::Cow;
use url::Url;

/// Errors that can occur during URL normalization.
#[derive(Debug, thiserror::Error)]
pub enum UrlNormalizationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Only HTTP and HTTPS protocols are allowed")]
    UnsupportedProtocol,

    #[error("URL must have a host")]
    MissingHost,
}

/// Returns true for input without a scheme, such as `example.com/path` or `localhost:3000`.
///
/// `scheme:rest` input (`mailto:`, `javascript:`) is not bare: it keeps its
/// scheme and is rejected later.
fn is_bare(input: &str) -> bool {
    if input.contains("://") {
        return false;
    }

    match input.split_once(':') {
        None => true,
        Some((head, rest)) => {
            head.contains('.')
                || head.eq_ignore_ascii_case("localhost")
                || rest.starts_with(|c: char| c.is_ascii_digit())
        }
    }
}

/// Prepends `http://` to bare domains.
pub fn with_default_scheme(input: &str) -> Cow<'_, str> {
    if is_bare(input) {
        Cow::Owned(format!("http://{input}"))
    } else {
        Cow::Borrowed(input)
    }
}

/// Normalizes a long URL to the form stored in the durable store.
///
/// # Normalization Rules
///
/// 1. **Whitespace**: Leading and trailing whitespace is trimmed
/// 2. **Scheme**: Bare domains get `http://`; only HTTP and HTTPS are allowed
/// 3. **Hostname**: Lowercased by the parser; default ports are dropped
/// 4. **Path, query, fragment**: Preserved as-is
///
/// # Errors
///
/// Returns [`UrlNormalizationError::InvalidFormat`] for malformed URLs.
/// Returns [`UrlNormalizationError::UnsupportedProtocol`] for non-HTTP(S) schemes.
/// Returns [`UrlNormalizationError::MissingHost`] for URLs without a host.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_url("example.com/a").unwrap(), "http://example.com/a");
/// assert_eq!(
///     normalize_url("HTTPS://EXAMPLE.COM:443/Path").unwrap(),
///     "https://example.com/Path"
/// );
/// ```
pub fn normalize_url(input: &str) -> Result<String, UrlNormalizationError> {
    let candidate = with_default_scheme(input.trim());

    let url =
        Url::parse(&candidate).map_err(|e| UrlNormalizationError::InvalidFormat(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(UrlNormalizationError::UnsupportedProtocol),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlNormalizationError::MissingHost);
    }

    Ok(url.to_string())
}
