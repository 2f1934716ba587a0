use crate::app::AppError;
use crate::domain::date_range::Interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Portal,
    Replay,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub username: String,
    pub password: String,
    pub poll_interval_seconds: u64,
    pub usage_days_back: i64,
    pub usage_interval: Interval,
    pub http_bind: String,
    pub data_source: DataSource,
    pub replay_script_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_source = match lookup("DATA_SOURCE").map(|v| v.trim().to_lowercase()) {
            None => DataSource::Portal,
            Some(value) if value == "portal" || value.is_empty() => DataSource::Portal,
            Some(value) if value == "replay" => DataSource::Replay,
            Some(other) => {
                return Err(AppError::config(format!(
                    "DATA_SOURCE must be 'portal' or 'replay', got '{other}'"
                )));
            }
        };

        let (username, password, replay_script_path) = match data_source {
            DataSource::Portal => (
                required(&lookup, "EVERGY_USERNAME")?,
                required(&lookup, "EVERGY_PASSWORD")?,
                None,
            ),
            DataSource::Replay => (
                String::new(),
                String::new(),
                Some(required(&lookup, "REPLAY_SCRIPT_PATH")?),
            ),
        };

        let usage_days_back = parse_or_default(&lookup, "USAGE_DAYS_BACK", 1_i64)?;
        if usage_days_back < 1 {
            return Err(AppError::config("USAGE_DAYS_BACK must be at least 1"));
        }

        let usage_interval = match lookup("USAGE_INTERVAL") {
            Some(raw) => raw
                .parse::<Interval>()
                .map_err(|error| AppError::config(error.to_string()))?,
            None => Interval::Day,
        };

        Ok(Self {
            username,
            password,
            poll_interval_seconds: parse_or_default(&lookup, "POLL_INTERVAL_SECONDS", 60_u64)?,
            usage_days_back,
            usage_interval,
            http_bind: lookup("HTTP_BIND")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            data_source,
            replay_script_path,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}
