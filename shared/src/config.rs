//! Tracker configuration.
//!
//! Loaded from environment variables (after a `.env` file, if present) with
//! defaults suited to a backend running locally.

use std::env;

use url::Url;

use crate::error::ValidationError;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Base URL the `/api/...` endpoints hang off
    pub api_base_url: String,
    /// Sent as `X-CSRFToken` on mutating requests
    pub csrf_token: Option<String>,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            csrf_token: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_base_url =
            env::var("BOOKWATCH_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let csrf_token = env::var("BOOKWATCH_CSRF_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let log_level =
            env::var("BOOKWATCH_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        Self {
            api_base_url,
            csrf_token,
            log_level,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.api_url()?;

        if let Some(token) = &self.csrf_token {
            if token.chars().any(|c| c.is_control()) {
                return Err(ValidationError::Config(
                    "csrf_token contains control characters".into(),
                ));
            }
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::Config(format!(
                "log_level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Parsed base URL, normalised to end in `/` so endpoint paths join under it.
    pub fn api_url(&self) -> Result<Url, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidUrl {
            url: self.api_base_url.clone(),
            reason,
        };

        let mut url = Url::parse(self.api_base_url.trim()).map_err(|e| invalid(e.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid(format!(
                "invalid scheme '{}', only 'http' and 'https' are allowed",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(invalid("URL must have a host".into()));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("credentials in URL are not allowed".into()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("base URL cannot carry a query or fragment".into()));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(url)
    }
}
