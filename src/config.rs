//! Runtime configuration.
//!
//! Values come from environment variables; a `.env` file in the working
//! directory is read first for local use.

use crate::error::{Result, ScraperError};
use crate::models::DelayConfig;
use crate::reconciler::RefreshPolicy;
use chrono::{FixedOffset, TimeDelta};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://learn.hansung.ac.kr";

/// Holds all configuration loaded at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// LMS origin.
    pub base_url: Url,
    /// Raw `Cookie` header of an authenticated browser session.
    pub session_cookie: Option<String>,
    /// Directory of the file-backed store.
    pub store_dir: PathBuf,
    /// How old the last refresh may get before the next activation refetches.
    pub staleness_hours: i64,
    /// Upper bound on courses aggregated at the same time.
    pub max_concurrent_courses: usize,
    /// Per-request timeout, `None` to wait indefinitely.
    pub request_timeout: Option<Duration>,
    /// Randomized pause before each request.
    pub delay: DelayConfig,
    /// UTC offset of the wall clock the LMS prints dates in.
    pub lms_utc_offset_hours: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            session_cookie: None,
            store_dir: PathBuf::from("./dotbugi-store"),
            staleness_hours: 24,
            max_concurrent_courses: 4,
            request_timeout: Some(Duration::from_secs(30)),
            delay: DelayConfig {
                min_delay_ms: 0,
                max_delay_ms: 0,
                enabled: false,
            },
            lms_utc_offset_hours: 9,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = match var("LMS_BASE_URL") {
            Some(raw) => Url::parse(&raw).map_err(|e| invalid("LMS_BASE_URL", &raw, e))?,
            None => defaults.base_url,
        };

        let staleness_hours = parse_or(
            "DOTBUGI_STALENESS_HOURS",
            var("DOTBUGI_STALENESS_HOURS"),
            defaults.staleness_hours,
        )?;
        if staleness_hours < 0 {
            return Err(ScraperError::ConfigError(
                "DOTBUGI_STALENESS_HOURS must not be negative".to_string(),
            ));
        }

        let max_concurrent_courses = parse_or(
            "DOTBUGI_MAX_CONCURRENT_COURSES",
            var("DOTBUGI_MAX_CONCURRENT_COURSES"),
            defaults.max_concurrent_courses,
        )?;
        if max_concurrent_courses == 0 {
            return Err(ScraperError::ConfigError(
                "DOTBUGI_MAX_CONCURRENT_COURSES must be at least 1".to_string(),
            ));
        }

        let request_timeout = match var("DOTBUGI_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .map_err(|e| invalid("DOTBUGI_REQUEST_TIMEOUT_SECS", &raw, e))?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => defaults.request_timeout,
        };

        let delay = DelayConfig {
            min_delay_ms: parse_or(
                "DOTBUGI_DELAY_MIN_MS",
                var("DOTBUGI_DELAY_MIN_MS"),
                defaults.delay.min_delay_ms,
            )?,
            max_delay_ms: parse_or(
                "DOTBUGI_DELAY_MAX_MS",
                var("DOTBUGI_DELAY_MAX_MS"),
                defaults.delay.max_delay_ms,
            )?,
            enabled: parse_or(
                "DOTBUGI_DELAY_ENABLED",
                var("DOTBUGI_DELAY_ENABLED"),
                defaults.delay.enabled,
            )?,
        };

        let lms_utc_offset_hours = parse_or(
            "LMS_UTC_OFFSET_HOURS",
            var("LMS_UTC_OFFSET_HOURS"),
            defaults.lms_utc_offset_hours,
        )?;
        if !(-23..=23).contains(&lms_utc_offset_hours) {
            return Err(ScraperError::ConfigError(
                "LMS_UTC_OFFSET_HOURS must be between -23 and 23".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            session_cookie: var("LMS_SESSION_COOKIE"),
            store_dir: var("DOTBUGI_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            staleness_hours,
            max_concurrent_courses,
            request_timeout,
            delay,
            lms_utc_offset_hours,
        })
    }

    /// The refresh policy these settings describe.
    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            staleness: TimeDelta::try_hours(self.staleness_hours).unwrap_or(TimeDelta::MAX),
            max_concurrent_courses: self.max_concurrent_courses,
            ..RefreshPolicy::default()
        }
    }

    /// The LMS wall-clock offset.
    pub fn lms_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.lms_utc_offset_hours * 3600).ok_or_else(|| {
            ScraperError::ConfigError(format!(
                "unsupported UTC offset: {} hours",
                self.lms_utc_offset_hours
            ))
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e| invalid(key, &raw, e)),
        None => Ok(default),
    }
}

fn invalid(key: &str, raw: &str, error: impl std::fmt::Display) -> ScraperError {
    ScraperError::ConfigError(format!("invalid value for {}: `{}` ({})", key, raw, error))
}
