use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use chrono::{SecondsFormat, Utc};
use thiserror::Error;

use crate::adapters::api::{ApiState, configure_routes};
use crate::adapters::portal::{PortalClient, PortalError, UsageProvider};
use crate::adapters::portal_replay::PortalReplayClient;
use crate::app::config::{AppConfig, DataSource};
use crate::app::error::AppError;
use crate::app::services::{InMemoryReadingsService, ReadingsCommandHandler, ServiceError};
use crate::domain::date_range::Interval;

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("failed to refresh usage data: {0}")]
    Refresh(#[source] PortalError),
    #[error("failed to publish readings: {0}")]
    Publish(#[source] ServiceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated { records: usize },
    NoFreshData,
}

pub struct UsagePoller<P> {
    provider: P,
    readings: InMemoryReadingsService,
    days_back: i64,
    interval: Interval,
}

impl<P: UsageProvider> UsagePoller<P> {
    pub fn new(
        provider: P,
        readings: InMemoryReadingsService,
        days_back: i64,
        interval: Interval,
    ) -> Self {
        Self {
            provider,
            readings,
            days_back,
            interval,
        }
    }

    pub fn tick(&mut self) -> Result<RefreshOutcome, PollerError> {
        let report = self
            .provider
            .fetch_usage(self.days_back, self.interval)
            .map_err(PollerError::Refresh)?;

        match report {
            Some(report) => {
                let records = report.usage.len();
                self.readings
                    .record_refresh(report, now_iso8601())
                    .map_err(PollerError::Publish)?;
                tracing::info!(records, "usage readings refreshed");
                Ok(RefreshOutcome::Updated { records })
            }
            None => {
                self.readings.record_miss().map_err(PollerError::Publish)?;
                tracing::warn!("refresh cycle produced no fresh data; keeping previous readings");
                Ok(RefreshOutcome::NoFreshData)
            }
        }
    }
}

pub fn start_poller<P: UsageProvider>(
    mut poller: UsagePoller<P>,
    poll_interval: Duration,
    stop_flag: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while !stop_flag.load(Ordering::Relaxed) {
            if let Err(error) = poller.tick() {
                tracing::warn!(error = %error, "poll cycle failed");
            }
            std::thread::sleep(poll_interval);
        }
    })
}

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let readings = InMemoryReadingsService::new();

    match config.data_source {
        DataSource::Portal => {
            let client = PortalClient::new(config.username.clone(), config.password.clone())
                .map_err(AppError::runtime)?;
            run_with_provider(config, client, readings)
        }
        DataSource::Replay => {
            let path = config
                .replay_script_path
                .clone()
                .ok_or_else(|| AppError::config("REPLAY_SCRIPT_PATH is required"))?;
            let client = PortalReplayClient::from_path(&path).map_err(AppError::runtime)?;
            run_with_provider(config, client, readings)
        }
    }
}

fn run_with_provider<P: UsageProvider>(
    config: AppConfig,
    provider: P,
    readings: InMemoryReadingsService,
) -> Result<(), AppError> {
    let poller = UsagePoller::new(
        provider,
        readings.clone(),
        config.usage_days_back,
        config.usage_interval,
    );
    let stop_flag = Arc::new(AtomicBool::new(false));
    let poller_handle = start_poller(
        poller,
        Duration::from_secs(config.poll_interval_seconds),
        Arc::clone(&stop_flag),
    );

    let api_state = ApiState { readings };

    tracing::info!(bind = %config.http_bind, "http server starting");

    let server_result = actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .app_data(web::Data::new(api_state.clone()))
                .configure(configure_routes)
        })
        .bind(&config.http_bind)?
        .run()
        .await
    });

    stop_flag.store(true, Ordering::Relaxed);
    if poller_handle.join().is_err() {
        return Err(AppError::runtime("poller thread panicked"));
    }

    server_result.map_err(AppError::runtime)
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
