use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::observation::Availability;

/// Runtime configuration for the coverage verifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Matching policy
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Navigation fan-in settings
    #[serde(default)]
    pub fan_in: FanInConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Matching policy shared by every query group of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MatchingConfig {
    /// States accepted in place of `available` when a group requires availability
    #[serde(default = "default_available_equivalents")]
    pub available_equivalents: Vec<Availability>,

    /// Credit queries whose every target was observed sold out
    #[serde(default)]
    pub credit_exhausted_queries: bool,
}

fn default_available_equivalents() -> Vec<Availability> {
    vec![Availability::Limited]
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            available_equivalents: default_available_equivalents(),
            credit_exhausted_queries: false,
        }
    }
}

/// Navigation fan-in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FanInConfig {
    /// Capacity of the bounded event queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

const fn default_queue_capacity() -> usize {
    256
}

impl Default for FanInConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}
