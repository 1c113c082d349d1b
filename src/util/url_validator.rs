use std::net::IpAddr;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Insecure URL: HTTPS required except for loopback hosts")]
    Insecure,
}

/// Validate the backend base URL.
///
/// `https` is always accepted. Plain `http` is accepted only for loopback
/// hosts, which covers local development and mock servers.
///
/// # Arguments
///
/// * `url_str` - The configured base URL
///
/// # Returns
///
/// The parsed [`Url`], always ending with `/` so endpoint paths can be
/// joined onto it without dropping its last segment.
///
/// # Errors
///
/// Returns [`UrlValidationError`] if:
/// - The URL cannot be parsed ([`UrlValidationError::InvalidUrl`])
/// - The scheme is neither `http` nor `https` ([`UrlValidationError::UnsupportedScheme`])
/// - The scheme is `http` and the host is not loopback ([`UrlValidationError::Insecure`])
pub fn validate_api_base(url_str: &str) -> Result<Url, UrlValidationError> {
    let mut url = Url::parse(url_str)?;

    match url.scheme() {
        "https" => {}
        "http" if is_loopback(&url) => {
            tracing::warn!(base_url = %url, "Using plain HTTP API base URL (loopback only)");
        }
        "http" => return Err(UrlValidationError::Insecure),
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Validate a media URL before handing it to the system player.
pub fn validate_media_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback()),
        None => false,
    }
}
