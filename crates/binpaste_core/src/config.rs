//! Configuration loading from environment variables.

use crate::constants::{
    DEFAULT_MAX_PASTE_SIZE, DEFAULT_PORT, DEFAULT_REAPER_INTERVAL_SECS, DEFAULT_RETENTION_DAYS,
    DEFAULT_TRACKING_MAX_REDELIVERIES, DEFAULT_TRACKING_POLL_INTERVAL_MS, MAX_RETENTION_DAYS,
};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for binpaste.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub db_path: String,
    pub port: u16,
    pub max_paste_size: usize,
    pub retention_days: i64,
    pub reaper_interval_secs: u64,
    pub tracking_poll_interval_ms: u64,
    pub tracking_max_redeliveries: u32,
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: String) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = resolve_home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path
}

fn resolve_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.trim().is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    std::env::current_dir().ok()
}

fn default_db_path() -> String {
    let home = resolve_home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".cache")
        .join("binpaste")
        .join("db")
        .to_string_lossy()
        .to_string()
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment.
///
/// Missing or unrecognized values are treated as `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

fn parsed_or<T, F>(lookup: &F, name: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring unparseable {}='{}'; using default", name, raw);
                default
            }
        },
        None => default,
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Arguments
    /// - `lookup`: Returns the raw value for a variable name, if set.
    ///
    /// # Returns
    /// A populated [`Config`]; missing or unparseable values use defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            db_path: lookup("DB_PATH")
                .filter(|path| !path.trim().is_empty())
                .map(expand_tilde)
                .unwrap_or_else(default_db_path),
            port: parsed_or(&lookup, "PORT", DEFAULT_PORT),
            max_paste_size: parsed_or(&lookup, "MAX_PASTE_SIZE", DEFAULT_MAX_PASTE_SIZE),
            retention_days: parsed_or(&lookup, "RETENTION_DAYS", DEFAULT_RETENTION_DAYS),
            reaper_interval_secs: parsed_or(
                &lookup,
                "REAPER_INTERVAL_SECS",
                DEFAULT_REAPER_INTERVAL_SECS,
            ),
            tracking_poll_interval_ms: parsed_or(
                &lookup,
                "TRACKING_POLL_INTERVAL_MS",
                DEFAULT_TRACKING_POLL_INTERVAL_MS,
            ),
            tracking_max_redeliveries: parsed_or(
                &lookup,
                "TRACKING_MAX_REDELIVERIES",
                DEFAULT_TRACKING_MAX_REDELIVERIES,
            ),
        }
    }

    /// Retention window applied by the purge sweep, clamped to
    /// `0..=MAX_RETENTION_DAYS`.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days.clamp(0, MAX_RETENTION_DAYS))
    }

    /// Cadence of the reaper scheduler.
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }

    /// Idle poll interval of the tracking worker.
    pub fn tracking_poll_interval(&self) -> Duration {
        Duration::from_millis(self.tracking_poll_interval_ms.max(1))
    }
}
