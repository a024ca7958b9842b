use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::parking::{DayNightWindow, RetryPolicy, WindowError};

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub parking: ParkingConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            parking: ParkingConfig::from_env()?,
        })
    }
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Shape of the lot seeded at startup and how hard gates fight over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkingConfig {
    pub total_space: u32,
    pub window: DayNightWindow,
    pub retry: RetryPolicy,
}

impl ParkingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let total_space = env_number("PARKING_TOTAL_SPACE", 200u32)?;
        let daily_start = env_number("PARKING_DAILY_START_HOUR", 8u8)?;
        let nightly_start = env_number("PARKING_NIGHTLY_START_HOUR", 18u8)?;
        let window =
            DayNightWindow::new(daily_start, nightly_start).map_err(ConfigError::InvalidWindow)?;

        let mut retry = RetryPolicy {
            max_attempts: None,
            base_backoff: Duration::from_millis(env_number("PARKING_RETRY_BACKOFF_MS", 5)?),
            max_backoff: Duration::from_millis(env_number("PARKING_RETRY_MAX_BACKOFF_MS", 200)?),
        };
        if let Ok(raw) = env::var("PARKING_MAX_CONFLICT_RETRIES") {
            let retries = parse_number::<u32>("PARKING_MAX_CONFLICT_RETRIES", &raw)?;
            retry = retry.with_max_retries(retries);
        }

        Ok(Self {
            total_space,
            window,
            retry,
        })
    }
}

impl Default for ParkingConfig {
    fn default() -> Self {
        Self {
            total_space: 200,
            window: DayNightWindow::default(),
            retry: RetryPolicy::default(),
        }
    }
}

fn env_number<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => parse_number(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidWindow(WindowError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidWindow(err) => write!(f, "invalid day/night window: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidWindow(err) => Some(err),
        }
    }
}
