//! Cluster URL normalization and the plain-HTTP fallback for private hosts

use thiserror::Error;
use url::Url;

/// Reasons a cluster URL is refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Elasticsearch URL is empty")]
    Empty,

    #[error("invalid Elasticsearch URL '{url}': {reason}")]
    Malformed { url: String, reason: String },

    #[error("Elasticsearch URL '{0}' has no host")]
    MissingHost(String),

    #[error("unsupported scheme '{scheme}' in '{url}', expected http or https")]
    UnsupportedScheme { url: String, scheme: String },
}

/// Validate a cluster URL and strip trailing slashes.
///
/// The returned string is the trimmed input minus trailing `/`, not the
/// re-serialized [`Url`], so `https://es:9200/` becomes `https://es:9200`.
/// Only the scheme is lowercased.
pub fn normalize_url(raw: &str) -> Result<String, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let stripped = trimmed.trim_end_matches('/');

    let parsed = Url::parse(stripped).map_err(|e| UrlError::Malformed {
        url: stripped.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(UrlError::UnsupportedScheme {
                url: stripped.to_string(),
                scheme: other.to_string(),
            })
        }
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(lowercase_scheme(stripped, parsed.scheme())),
        _ => Err(UrlError::MissingHost(stripped.to_string())),
    }
}

fn lowercase_scheme(url: &str, scheme: &str) -> String {
    match url.get(..scheme.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(scheme) => {
            format!("{}{}", scheme, &url[scheme.len()..])
        }
        _ => url.to_string(),
    }
}

/// True for `localhost` and the `10.*`, `172.*` and `192.168.*` ranges.
///
/// The prefixes are matched textually, so all of `172.*` counts, not only
/// `172.16.0.0/12`.
pub fn is_private_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host.starts_with("10.")
        || host.starts_with("172.")
        || host.starts_with("192.168.")
}

/// The plain-HTTP twin of an `https` URL pointing at a private host.
///
/// Returns `None` for `http` URLs, public hosts and unparseable input.
pub fn http_fallback(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "https" {
        return None;
    }
    if !parsed.host_str().map(is_private_host).unwrap_or(false) {
        return None;
    }
    let prefix = "https://";
    url.get(..prefix.len())
        .filter(|p| p.eq_ignore_ascii_case(prefix))
        .map(|_| format!("http://{}", &url[prefix.len()..]))
}
