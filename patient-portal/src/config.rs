use std::time::Duration;
use tracing::info;

use crate::error::{PortalError, Result};

/// Runtime settings, read from the environment once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalConfig {
    pub port: u16,
    /// Base URL of the triage backend, without a trailing slash
    pub api_base_url: String,
    pub api_timeout: Duration,
    /// Doctors fetched for the selection step
    pub doctor_selection_page_size: u32,
    /// Doctors fetched for the public directory
    pub doctor_list_page_size: u32,
    /// Sessions untouched for this long are dropped with their backend client
    pub session_idle_timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            api_base_url: "http://localhost:8080/api".to_string(),
            api_timeout: Duration::from_secs(15),
            doctor_selection_page_size: 20,
            doctor_list_page_size: 100,
            session_idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults, malformed
    /// values are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = lookup("API_BASE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(PortalError::Config(format!(
                "API_BASE_URL must be an http(s) URL, got '{api_base_url}'"
            )));
        }

        let config = Self {
            port: parse_or(&lookup, "PORT", defaults.port)?,
            api_base_url,
            api_timeout: Duration::from_secs(parse_or(
                &lookup,
                "API_TIMEOUT_SECS",
                defaults.api_timeout.as_secs(),
            )?),
            doctor_selection_page_size: parse_or(
                &lookup,
                "DOCTOR_SELECTION_PAGE_SIZE",
                defaults.doctor_selection_page_size,
            )?,
            doctor_list_page_size: parse_or(
                &lookup,
                "DOCTOR_LIST_PAGE_SIZE",
                defaults.doctor_list_page_size,
            )?,
            session_idle_timeout: Duration::from_secs(parse_or(
                &lookup,
                "SESSION_IDLE_TIMEOUT_SECS",
                defaults.session_idle_timeout.as_secs(),
            )?),
        };

        info!(
            port = config.port,
            api_base_url = %config.api_base_url,
            timeout_secs = config.api_timeout.as_secs(),
            "configuration loaded"
        );
        Ok(config)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PortalError::Config(format!("{key} has an invalid value '{raw}'"))),
    }
}
