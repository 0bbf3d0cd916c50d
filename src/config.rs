//! Application-level configuration loading: sweeper cadence, invitation defaults and delivery channel.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::services::{
    channels::ChannelKind,
    matching::{MAX_CANDIDATES, StrategyKind},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MATCHDAY_CONFIG_PATH";

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_START_TOLERANCE: Duration = Duration::from_secs(60);
const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// How often the sweeper scans matches.
    pub sweep_interval: Duration,
    /// How early before kick-off a confirmed match may be started.
    pub start_tolerance: Duration,
    /// Invitation batch size, never above [`MAX_CANDIDATES`].
    pub candidate_limit: usize,
    /// Strategy used when a caller does not pick one.
    pub default_strategy: StrategyKind,
    /// Channel notifications go out through.
    pub channel: ChannelKind,
    /// Push gateway URL, required by [`ChannelKind::Push`].
    pub push_endpoint: Option<String>,
    /// Upper bound for one delivery attempt.
    pub delivery_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        strategy = ?app_config.default_strategy,
                        channel = ?app_config.channel,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent keys keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    sweep_interval_secs: Option<u64>,
    start_tolerance_secs: Option<u64>,
    candidate_limit: Option<usize>,
    default_strategy: StrategyKind,
    channel: ChannelKind,
    push_endpoint: Option<String>,
    delivery_timeout_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            sweep_interval: value
                .sweep_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SWEEP_INTERVAL),
            start_tolerance: value
                .start_tolerance_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_START_TOLERANCE),
            candidate_limit: value
                .candidate_limit
                .unwrap_or(MAX_CANDIDATES)
                .clamp(1, MAX_CANDIDATES),
            default_strategy: value.default_strategy,
            channel: value.channel,
            push_endpoint: value.push_endpoint.filter(|url| !url.trim().is_empty()),
            delivery_timeout: value
                .delivery_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_DELIVERY_TIMEOUT),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.candidate_limit, MAX_CANDIDATES);
        assert_eq!(config.default_strategy, StrategyKind::Proximity);
        assert_eq!(config.channel, ChannelKind::Log);
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let config = AppConfig::from_json(
            r#"{
                "sweep_interval_secs": 15,
                "candidate_limit": 50,
                "default_strategy": "skill_tier",
                "channel": "push",
                "push_endpoint": "https://push.example.com/send",
                "delivery_timeout_ms": 250
            }"#,
        )
        .unwrap();

        assert_eq!(config.sweep_interval, Duration::from_secs(15));
        assert_eq!(config.candidate_limit, MAX_CANDIDATES);
        assert_eq!(config.default_strategy, StrategyKind::SkillTier);
        assert_eq!(config.channel, ChannelKind::Push);
        assert_eq!(
            config.push_endpoint.as_deref(),
            Some("https://push.example.com/send")
        );
        assert_eq!(config.delivery_timeout, Duration::from_millis(250));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(AppConfig::from_json(r#"{"colors": []}"#).is_err());
    }
}
