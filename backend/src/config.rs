//! Runtime configuration read from `WA_SENDER_*` environment variables.
//!
//! Every value has a default; an unparsable value is logged and ignored.

use log::warn;
use std::str::FromStr;
use std::time::Duration;

use crate::dispatch::link::sanitize_prefix;

pub const DEFAULT_BASE_URL: &str = "https://wa.me";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Deep-link base, without trailing slash.
    pub base_url: String,
    /// Country prefix used when a run request does not supply one.
    pub default_prefix: String,
    pub default_delay_secs: u64,
    pub max_delay_secs: u64,
    /// Log deep links instead of opening them.
    pub dry_run: bool,
    /// Open the server URL in a browser once the server is up.
    pub open_ui: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_prefix: "52".to_string(),
            default_delay_secs: 2,
            max_delay_secs: 10,
            dry_run: false,
            open_ui: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let max_delay_secs = parse_or(&lookup, "WA_SENDER_MAX_DELAY_SECS", defaults.max_delay_secs);

        Self {
            host: lookup("WA_SENDER_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "WA_SENDER_PORT", defaults.port),
            base_url: lookup("WA_SENDER_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.base_url),
            default_prefix: lookup("WA_SENDER_PREFIX")
                .map(|p| sanitize_prefix(&p))
                .unwrap_or(defaults.default_prefix),
            default_delay_secs: parse_or(&lookup, "WA_SENDER_DELAY_SECS", defaults.default_delay_secs)
                .min(max_delay_secs),
            max_delay_secs,
            dry_run: parse_flag(&lookup, "WA_SENDER_DRY_RUN", defaults.dry_run),
            open_ui: parse_flag(&lookup, "WA_SENDER_OPEN_UI", defaults.open_ui),
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Pacing between two messages. Requests above the maximum are clamped;
    /// zero is honoured.
    pub fn delay(&self, requested_secs: Option<u64>) -> Duration {
        let secs = requested_secs
            .unwrap_or(self.default_delay_secs)
            .min(self.max_delay_secs);
        Duration::from_secs(secs)
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value '{}' for {}", raw, key);
            default
        }),
        None => default,
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) => {
            warn!("Ignoring invalid flag '{}' for {}", v, key);
            default
        }
        None => default,
    }
}
