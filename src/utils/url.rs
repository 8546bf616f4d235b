//! Endpoint URL construction.
//!
//! Gateway base URLs are typed in by users and arrive with stray
//! whitespace and trailing slashes; endpoints are joined with exactly one
//! `/` between them.

/// Trim whitespace and trailing slashes from a base URL.
///
/// ```
/// use hubchat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url(" https://gw.example/v1/ "), "https://gw.example/v1");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path.
///
/// ```
/// use hubchat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://gw.example/v1/", "/chat/completions"),
///     "https://gw.example/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        endpoint.trim_start_matches('/')
    )
}
