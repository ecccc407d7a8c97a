use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

use crate::db::HourFilter;
use crate::srs::ladder::DEFAULT_LADDER_OFFSETS;
use crate::srs::sm2::{
    MasteryCriteria, Sm2Params, DEFAULT_INITIAL_EASINESS, DEFAULT_INITIAL_INTERVALS,
    DEFAULT_MAX_INTERVAL, DEFAULT_MIN_EASINESS,
};
use crate::srs::{LadderUpdater, ProgressUpdater, Strategies, PASS_THRESHOLD};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub srs: SrsConfig,
    pub reminders: ReminderConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());

        Self {
            host,
            port,
            log_level,
            database_url,
            srs: SrsConfig::from_env(),
            reminders: ReminderConfig::from_env(),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            srs: SrsConfig::default(),
            reminders: ReminderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SrsConfig {
    pub initial_easiness: f64,
    pub min_easiness: f64,
    pub initial_intervals: Vec<u32>,
    pub max_interval: u32,
    pub pass_threshold: u8,
    pub ladder_offsets: Vec<u32>,
}

impl Default for SrsConfig {
    fn default() -> Self {
        Self {
            initial_easiness: DEFAULT_INITIAL_EASINESS,
            min_easiness: DEFAULT_MIN_EASINESS,
            initial_intervals: DEFAULT_INITIAL_INTERVALS.to_vec(),
            max_interval: DEFAULT_MAX_INTERVAL,
            pass_threshold: PASS_THRESHOLD,
            ladder_offsets: DEFAULT_LADDER_OFFSETS.to_vec(),
        }
    }
}

impl SrsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            initial_easiness: env_parse("SRS_INITIAL_EASINESS", defaults.initial_easiness),
            min_easiness: env_parse("SRS_MIN_EASINESS", defaults.min_easiness),
            initial_intervals: env_list("SRS_INITIAL_INTERVALS")
                .unwrap_or_else(|| defaults.initial_intervals.clone()),
            max_interval: env_parse("SRS_MAX_INTERVAL", defaults.max_interval),
            pass_threshold: env_parse("SRS_PASS_THRESHOLD", defaults.pass_threshold),
            ladder_offsets: env_list("SRS_LADDER_OFFSETS")
                .unwrap_or_else(|| defaults.ladder_offsets.clone()),
        };

        match config.validate() {
            Ok(()) => config,
            Err(err) => {
                tracing::warn!(error = %err, "invalid SRS configuration, using defaults");
                defaults
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_easiness.is_finite() && self.min_easiness > 0.0) {
            return Err(ConfigError::Invalid {
                key: "SRS_MIN_EASINESS",
                reason: "must be a positive number".to_string(),
            });
        }
        if !(self.initial_easiness.is_finite() && self.initial_easiness >= self.min_easiness) {
            return Err(ConfigError::Invalid {
                key: "SRS_INITIAL_EASINESS",
                reason: format!("must be at least the minimum easiness {}", self.min_easiness),
            });
        }
        if self.initial_intervals.is_empty() || self.initial_intervals.contains(&0) {
            return Err(ConfigError::Invalid {
                key: "SRS_INITIAL_INTERVALS",
                reason: "must be a non-empty list of positive day counts".to_string(),
            });
        }
        if self.max_interval == 0 {
            return Err(ConfigError::Invalid {
                key: "SRS_MAX_INTERVAL",
                reason: "must be at least one day".to_string(),
            });
        }
        if self.pass_threshold == 0 || self.pass_threshold > 5 {
            return Err(ConfigError::Invalid {
                key: "SRS_PASS_THRESHOLD",
                reason: "must be within 1..=5".to_string(),
            });
        }
        if self.ladder_offsets.is_empty() || self.ladder_offsets.contains(&0) {
            return Err(ConfigError::Invalid {
                key: "SRS_LADDER_OFFSETS",
                reason: "must be a non-empty list of positive day counts".to_string(),
            });
        }
        Ok(())
    }

    pub fn sm2_params(&self) -> Sm2Params {
        Sm2Params {
            initial_easiness: self.initial_easiness,
            min_easiness: self.min_easiness,
            initial_intervals: self.initial_intervals.clone(),
            max_interval: self.max_interval,
            pass_threshold: self.pass_threshold,
            mastery: MasteryCriteria::default(),
        }
    }

    pub fn strategies(&self) -> Strategies {
        Strategies::new(
            ProgressUpdater::new(self.sm2_params()),
            LadderUpdater::new(self.ladder_offsets.clone()),
        )
    }
}

/// When a tick is allowed to deliver reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryWindow {
    /// Only learners whose preferred hour equals the current hour.
    ExactHour,
    /// Every learner with reminders on, while the hour is in `[start, end)`.
    /// A window with `start > end` wraps past midnight.
    QuietHours { start: u32, end: u32 },
}

impl DeliveryWindow {
    pub const DEFAULT_START: u32 = 4;
    pub const DEFAULT_END: u32 = 18;

    pub fn hour_filter(&self, local_hour: u32) -> Option<HourFilter> {
        match *self {
            DeliveryWindow::ExactHour => Some(HourFilter::Exact(local_hour)),
            DeliveryWindow::QuietHours { start, end } => {
                let open = if start <= end {
                    local_hour >= start && local_hour < end
                } else {
                    local_hour >= start || local_hour < end
                };
                open.then_some(HourFilter::Any)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// Six-field cron expression (with seconds) driving the tick.
    pub schedule: String,
    pub window: DeliveryWindow,
    pub utc_offset_hours: i32,
    pub max_per_delivery: usize,
    pub concurrency: usize,
    pub store_timeout: Duration,
    pub notifier_timeout: Duration,
    pub webhook_url: Option<String>,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            schedule: "0 0 * * * *".to_string(),
            window: DeliveryWindow::ExactHour,
            utc_offset_hours: 0,
            max_per_delivery: 50,
            concurrency: 8,
            store_timeout: Duration::from_millis(5000),
            notifier_timeout: Duration::from_millis(10000),
            webhook_url: None,
        }
    }
}

impl ReminderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let window = match std::env::var("REMINDER_WINDOW").ok().as_deref() {
            Some("quiet-hours") | Some("quiet_hours") => DeliveryWindow::QuietHours {
                start: env_parse("QUIET_HOURS_START", DeliveryWindow::DEFAULT_START),
                end: env_parse("QUIET_HOURS_END", DeliveryWindow::DEFAULT_END),
            },
            _ => DeliveryWindow::ExactHour,
        };

        let config = Self {
            schedule: std::env::var("REMINDER_SCHEDULE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| defaults.schedule.clone()),
            window,
            utc_offset_hours: env_parse("REMINDER_UTC_OFFSET_HOURS", defaults.utc_offset_hours),
            max_per_delivery: env_parse("REMINDER_MAX_PER_DELIVERY", defaults.max_per_delivery),
            concurrency: env_parse("REMINDER_CONCURRENCY", defaults.concurrency),
            store_timeout: Duration::from_millis(env_parse("STORE_TIMEOUT_MS", 5000u64)),
            notifier_timeout: Duration::from_millis(env_parse("NOTIFIER_TIMEOUT_MS", 10000u64)),
            webhook_url: std::env::var("REMINDER_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        };

        match config.validate() {
            Ok(()) => config,
            Err(err) => {
                tracing::warn!(error = %err, "invalid reminder configuration, using defaults");
                defaults
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let DeliveryWindow::QuietHours { start, end } = self.window {
            if start > 23 || end > 24 || start == end {
                return Err(ConfigError::Invalid {
                    key: "QUIET_HOURS_START",
                    reason: format!("window {start}..{end} is not a valid hour range"),
                });
            }
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(ConfigError::Invalid {
                key: "REMINDER_UTC_OFFSET_HOURS",
                reason: "must be within -12..=14".to_string(),
            });
        }
        if self.max_per_delivery == 0 || self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "REMINDER_MAX_PER_DELIVERY",
                reason: "delivery cap and concurrency must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Option<Vec<u32>> {
    let raw = std::env::var(key).ok()?;
    parse_day_list(&raw)
}

fn parse_day_list(raw: &str) -> Option<Vec<u32>> {
    let values: Result<Vec<u32>, _> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse::<u32>)
        .collect();
    values.ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_lists_parse_with_whitespace() {
        assert_eq!(parse_day_list("1, 3,7 ,10"), Some(vec![1, 3, 7, 10]));
        assert_eq!(parse_day_list("1,x"), None);
        assert_eq!(parse_day_list(""), None);
    }

    #[test]
    fn default_srs_config_is_valid() {
        assert!(SrsConfig::default().validate().is_ok());
        let bad = SrsConfig {
            initial_intervals: vec![0, 1],
            ..SrsConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn quiet_hours_window_is_half_open() {
        let window = DeliveryWindow::QuietHours { start: 4, end: 18 };
        assert_eq!(window.hour_filter(3), None);
        assert_eq!(window.hour_filter(4), Some(HourFilter::Any));
        assert_eq!(window.hour_filter(17), Some(HourFilter::Any));
        assert_eq!(window.hour_filter(18), None);
    }

    #[test]
    fn quiet_hours_window_can_wrap_midnight() {
        let window = DeliveryWindow::QuietHours { start: 22, end: 2 };
        assert_eq!(window.hour_filter(23), Some(HourFilter::Any));
        assert_eq!(window.hour_filter(1), Some(HourFilter::Any));
        assert_eq!(window.hour_filter(12), None);
    }

    #[test]
    fn exact_hour_filters_by_current_hour() {
        assert_eq!(
            DeliveryWindow::ExactHour.hour_filter(9),
            Some(HourFilter::Exact(9))
        );
    }
}
