//! Configuration helpers for the Dify agent SDK

use std::env;

/// Default endpoint of the hosted Dify API.
pub const DEFAULT_BASE_URL: &str = "https://api.dify.ai/v1";

/// Get the API key from the DIFY_API_KEY environment variable or fallback
///
/// # Examples
///
/// ```rust,no_run
/// use dify_agent::get_api_key;
///
/// // Read from environment
/// let key = get_api_key(None);
///
/// // With fallback
/// let key = get_api_key(Some("app-xxx"));
/// ```
pub fn get_api_key(fallback: Option<&str>) -> Option<String> {
    api_key_from(env::var("DIFY_API_KEY").ok(), fallback)
}

/// Get the base URL from the DIFY_BASE_URL environment variable, the
/// fallback parameter, or the hosted API default
pub fn get_base_url(fallback: Option<&str>) -> String {
    base_url_from(env::var("DIFY_BASE_URL").ok(), fallback)
}

/// Get the user identity from the DIFY_USER environment variable or
/// fallback
pub fn get_user(fallback: Option<&str>) -> Option<String> {
    user_from(env::var("DIFY_USER").ok(), fallback)
}

fn api_key_from(env_value: Option<String>, fallback: Option<&str>) -> Option<String> {
    env_value.or_else(|| fallback.map(|s| s.to_string()))
}

fn base_url_from(env_value: Option<String>, fallback: Option<&str>) -> String {
    env_value.unwrap_or_else(|| fallback.unwrap_or(DEFAULT_BASE_URL).to_string())
}

fn user_from(env_value: Option<String>, fallback: Option<&str>) -> Option<String> {
    env_value.or_else(|| fallback.map(|s| s.to_string()))
}
