mod config;
mod error;
mod logging;
mod runtime;
pub mod services;

pub use error::AppError;

pub fn run() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();

    logging::init()?;

    let config = config::AppConfig::from_env()?;

    tracing::info!(
        poll_interval_seconds = config.poll_interval_seconds,
        usage_days_back = config.usage_days_back,
        usage_interval = %config.usage_interval,
        http_bind = %config.http_bind,
        data_source = ?config.data_source,
        "application bootstrap initialized"
    );

    runtime::run(config)
}
