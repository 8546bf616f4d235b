//! Authentication utilities for API requests

use reqwest::header::AUTHORIZATION;

/// Add the OpenAI-style `Authorization: Bearer` header to a request.
///
/// Every gateway this client talks to accepts bearer keys, so there is no
/// per-provider header scheme.
pub fn add_auth_headers(request: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
    request.header(AUTHORIZATION, format!("Bearer {}", api_key.trim()))
}
