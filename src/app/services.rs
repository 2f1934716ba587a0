use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::models::{DashboardSnapshot, UsageRecord, UsageReport};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("readings lock poisoned")]
    ReadingsLockPoisoned,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub refreshed_at: Option<String>,
    pub consecutive_misses: u32,
    pub has_data: bool,
}

pub trait ReadingsQueryHandler {
    fn dashboard(&self) -> Result<Option<DashboardSnapshot>, ServiceError>;
    fn usage(&self) -> Result<Vec<UsageRecord>, ServiceError>;
    fn latest_usage(&self) -> Result<Option<UsageRecord>, ServiceError>;
    fn sensor_value(&self, key: &str) -> Result<Option<Value>, ServiceError>;
    fn refresh_status(&self) -> Result<RefreshStatus, ServiceError>;
}

pub trait ReadingsCommandHandler {
    fn record_refresh(&self, report: UsageReport, refreshed_at: String)
    -> Result<(), ServiceError>;
    fn record_miss(&self) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct ReadingsState {
    dashboard: Option<DashboardSnapshot>,
    usage: Vec<UsageRecord>,
    refreshed_at: Option<String>,
    consecutive_misses: u32,
}

#[derive(Clone, Default)]
pub struct InMemoryReadingsService {
    state: Arc<RwLock<ReadingsState>>,
}

impl InMemoryReadingsService {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, op: impl FnOnce(&ReadingsState) -> T) -> Result<T, ServiceError> {
        let state = self
            .state
            .read()
            .map_err(|_| ServiceError::ReadingsLockPoisoned)?;
        Ok(op(&state))
    }

    fn write<T>(&self, op: impl FnOnce(&mut ReadingsState) -> T) -> Result<T, ServiceError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ServiceError::ReadingsLockPoisoned)?;
        Ok(op(&mut state))
    }
}

impl ReadingsQueryHandler for InMemoryReadingsService {
    fn dashboard(&self) -> Result<Option<DashboardSnapshot>, ServiceError> {
        self.read(|state| state.dashboard.clone())
    }

    fn usage(&self) -> Result<Vec<UsageRecord>, ServiceError> {
        self.read(|state| state.usage.clone())
    }

    fn latest_usage(&self) -> Result<Option<UsageRecord>, ServiceError> {
        self.read(|state| state.usage.last().cloned())
    }

    fn sensor_value(&self, key: &str) -> Result<Option<Value>, ServiceError> {
        self.read(|state| resolve_sensor(state, key))
    }

    fn refresh_status(&self) -> Result<RefreshStatus, ServiceError> {
        self.read(|state| RefreshStatus {
            refreshed_at: state.refreshed_at.clone(),
            consecutive_misses: state.consecutive_misses,
            has_data: state.dashboard.is_some(),
        })
    }
}

impl ReadingsCommandHandler for InMemoryReadingsService {
    fn record_refresh(
        &self,
        report: UsageReport,
        refreshed_at: String,
    ) -> Result<(), ServiceError> {
        self.write(|state| {
            state.dashboard = Some(report.dashboard);
            state.usage = report.usage;
            state.refreshed_at = Some(refreshed_at);
            state.consecutive_misses = 0;
        })
    }

    fn record_miss(&self) -> Result<(), ServiceError> {
        self.write(|state| {
            state.consecutive_misses += 1;
        })
    }
}

// Sensor keys follow the portal's field names: `address`, `billAmount` and
// `isPastDue` read from the dashboard, everything else from the most recent
// usage record.
fn resolve_sensor(state: &ReadingsState, key: &str) -> Option<Value> {
    match key {
        "address" => state
            .dashboard
            .as_ref()?
            .street()
            .map(|street| Value::String(street.to_string())),
        "billAmount" | "isPastDue" => state.dashboard.as_ref()?.field(key),
        _ => state.usage.last()?.field(key),
    }
}
