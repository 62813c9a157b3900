//! Client configuration.
//!
//! The remote API base address is resolved once at startup: an explicit
//! `DROPUX_API_URL` override wins, otherwise the first entry of the
//! environment-specific default list is used.

use tracing::info;

/// Environment variable for an explicit base-URL override.
const API_URL_ENV: &str = "DROPUX_API_URL";

/// Environment variable selecting production vs development defaults.
const ENVIRONMENT_ENV: &str = "DROPUX_ENV";

/// Production backends, in order of preference.
const PRODUCTION_URLS: [&str; 2] = [
    "https://web-production-ae7da.up.railway.app",
    "https://api.dropux.co",
];

/// Development backends.
const DEVELOPMENT_URLS: [&str; 2] = ["http://localhost:8000", "http://127.0.0.1:8000"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    /// Read the environment from `DROPUX_ENV`. Anything other than an
    /// explicit development value means production.
    pub fn from_env() -> Self {
        match std::env::var(ENVIRONMENT_ENV).as_deref() {
            Ok("development") | Ok("dev") => Environment::Development,
            _ => Environment::Production,
        }
    }

    pub fn default_urls(self) -> &'static [&'static str] {
        match self {
            Environment::Production => &PRODUCTION_URLS,
            Environment::Development => &DEVELOPMENT_URLS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub environment: Environment,
}

impl Config {
    /// Resolve the base address from the process environment.
    pub fn resolve() -> Self {
        let environment = Environment::from_env();

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.is_empty() {
                info!(url = %url, "Using API URL from environment");
                return Self {
                    base_url: normalize_base_url(&url),
                    environment,
                };
            }
        }

        let base_url = environment.default_urls()[0].to_string();
        info!(url = %base_url, "Using default API URL");
        Self {
            base_url,
            environment,
        }
    }

    /// Build a config with an explicit base address, bypassing environment
    /// resolution. Used by tests and embedders.
    pub fn with_base_url(url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&url.into()),
            environment: Environment::from_env(),
        }
    }
}

/// Endpoints are joined as `base_url + endpoint` with the endpoint carrying
/// the leading slash, so the base must not end with one.
fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls_first_entry() {
        assert_eq!(
            Environment::Production.default_urls()[0],
            "https://web-production-ae7da.up.railway.app"
        );
        assert_eq!(
            Environment::Development.default_urls()[0],
            "http://localhost:8000"
        );
    }

    #[test]
    fn test_with_base_url_strips_trailing_slash() {
        let config = Config::with_base_url("http://localhost:8000/");
        assert_eq!(config.base_url, "http://localhost:8000");

        let config = Config::with_base_url("https://api.dropux.co");
        assert_eq!(config.base_url, "https://api.dropux.co");
    }
}
