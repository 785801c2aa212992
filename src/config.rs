use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub api_base: Url,
    pub api_timeout: Duration,
    pub poll_interval: Duration,
    pub snooze_minutes: u32,
    pub cookie_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://hersync.db?mode=rwc".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let api_base = env::var("API_BASE")
            .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());
        let api_base = Url::parse(&api_base)
            .map_err(|err| AppError::Config(format!("invalid API_BASE: {err}")))?;

        let api_timeout = Duration::from_secs(parse_var("API_TIMEOUT_SECS", 10)?);
        let poll_interval = Duration::from_secs(parse_var("NOTIFICATION_POLL_SECS", 30)?);
        if poll_interval.is_zero() {
            return Err(AppError::Config(
                "NOTIFICATION_POLL_SECS must be greater than zero".into(),
            ));
        }
        let snooze_minutes = parse_var("SNOOZE_MINUTES", 60)?;

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-hersync-flash-cookie-secret".to_string());

        Ok(Self {
            database_url,
            listen_addr,
            api_base,
            api_timeout,
            poll_interval,
            snooze_minutes,
            cookie_secret,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| AppError::Config(format!("invalid {name}: {err}"))),
        Err(_) => Ok(default),
    }
}
