use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Upper bound for any day count read from the environment.
pub const MAX_CONFIG_DAYS: u32 = 3650;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the licensing service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scheduler: SchedulerConfig,
    pub deadlines: DeadlineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let scheduler_defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            enabled: read_bool("APP_SCHEDULER_ENABLED", scheduler_defaults.enabled)?,
            overdue_interval: Duration::from_secs(read_positive(
                "APP_OVERDUE_SCAN_SECS",
                scheduler_defaults.overdue_interval.as_secs(),
            )?),
            reminder_interval: Duration::from_secs(read_positive(
                "APP_REMINDER_SCAN_SECS",
                scheduler_defaults.reminder_interval.as_secs(),
            )?),
        };

        let deadline_defaults = DeadlineConfig::default();
        let deadlines = DeadlineConfig {
            review_window_days: read_window_days(
                "APP_REVIEW_WINDOW_DAYS",
                deadline_defaults.review_window_days,
            )?,
            request_reminder_days: read_day_list(
                "APP_REQUEST_REMINDER_DAYS",
                deadline_defaults.request_reminder_days,
            )?,
            report_reminder_days: read_day_list(
                "APP_REPORT_REMINDER_DAYS",
                deadline_defaults.report_reminder_days,
            )?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scheduler,
            deadlines,
        })
    }
}

fn read_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { key }),
        },
    }
}

fn read_positive(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidNumber { key }),
        },
    }
}

fn read_window_days(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    let days = read_positive(key, u64::from(default))?;
    u32::try_from(days)
        .ok()
        .filter(|days| *days <= MAX_CONFIG_DAYS)
        .ok_or(ConfigError::InvalidNumber { key })
}

fn read_day_list(key: &'static str, default: Vec<u32>) -> Result<Vec<u32>, ConfigError> {
    let raw = match env::var(key) {
        Err(_) => return Ok(default),
        Ok(raw) => raw,
    };

    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<u32>() {
            Ok(days) if days <= MAX_CONFIG_DAYS => Ok(days),
            _ => Err(ConfigError::InvalidNumber { key }),
        })
        .collect()
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Cadence of the background deadline scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub overdue_interval: Duration,
    pub reminder_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            overdue_interval: Duration::from_secs(24 * 60 * 60),
            reminder_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Reminder lead times and the audit review window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineConfig {
    pub review_window_days: u32,
    pub request_reminder_days: Vec<u32>,
    pub report_reminder_days: Vec<u32>,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            review_window_days: 14,
            request_reminder_days: vec![30, 7],
            report_reminder_days: vec![3],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("{key} must be true or false")]
    InvalidBool { key: &'static str },
    #[error("{key} must be a positive integer (or a comma separated list) of at most 3650 days")]
    InvalidNumber { key: &'static str },
}
