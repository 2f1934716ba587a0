use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::redirect::Policy;
use thiserror::Error;

use crate::domain::date_range::{Clock, DateRange, DateRangeError, Interval, SystemClock};
use crate::domain::login_form::{LoginFormError, extract_login_token};
use crate::domain::models::{
    AccountSummary, DashboardSnapshot, UsageQueryResponse, UsageRecord, UsageReport,
};

const HTTP_TIMEOUT_SECONDS: u64 = 30;

const RETRY_STATUS: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

// The portal answers with one of these once an idle session has been
// dropped server-side.
const SESSION_LOST_STATUS: [StatusCode; 4] = [
    StatusCode::BAD_REQUEST,
    StatusCode::UNAUTHORIZED,
    StatusCode::FORBIDDEN,
    StatusCode::METHOD_NOT_ALLOWED,
];

pub trait UsageProvider: Send + 'static {
    fn fetch_usage(
        &mut self,
        days_back: i64,
        interval: Interval,
    ) -> Result<Option<UsageReport>, PortalError>;
}

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("invalid usage range: {0}")]
    InvalidRange(#[from] DateRangeError),
    #[error("portal endpoint gave no usable response: {url}")]
    Unavailable { url: String },
    #[error("login form could not be parsed: {0}")]
    LoginForm(#[from] LoginFormError),
    #[error("login rejected: account selector returned no accounts")]
    NoAccounts,
    #[error("login did not resolve an account number and premise id")]
    SessionIncomplete,
    #[error("portal request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("portal payload could not be parsed: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("replay script could not be read: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff grows with the attempt index, so the first retry is immediate.
    pub fn delay_before_retry(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

#[derive(Debug, Clone)]
pub struct PortalEndpoints {
    base_url: String,
}

impl Default for PortalEndpoints {
    fn default() -> Self {
        Self::for_base_url("https://www.evergy.com")
    }
}

impl PortalEndpoints {
    pub fn for_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn login_page(&self) -> String {
        format!("{}/log-in", self.base_url)
    }

    pub fn logout(&self) -> String {
        format!("{}/logout", self.base_url)
    }

    pub fn account_selector(&self) -> String {
        format!(
            "{}/sc-api/account/getaccountpremiseselector?isWidgetPage=false&hasNoSelector=false",
            self.base_url
        )
    }

    pub fn account_dashboard(&self, account_number: &str) -> String {
        format!(
            "{}/api/account/{}/dashboard/current",
            self.base_url, account_number
        )
    }

    pub fn usage_report(&self, premise_id: &str, interval: Interval, range: &DateRange) -> String {
        format!(
            "{}/api/report/usage/{}?interval={}&from={}&to={}",
            self.base_url,
            premise_id,
            interval.code(),
            range.start(),
            range.end()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub logged_in: bool,
    pub account_number: Option<String>,
    pub premise_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reauth {
    Allowed,
    Forbidden,
}

pub struct PortalClient<C = SystemClock> {
    username: String,
    password: String,
    endpoints: PortalEndpoints,
    retry: RetryPolicy,
    clock: C,
    http: Client,
    session: Session,
    dashboard_data: Option<DashboardSnapshot>,
    usage_data: Option<Vec<UsageRecord>>,
}

impl PortalClient<SystemClock> {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, PortalError> {
        Self::with_clock(username, password, SystemClock)
    }
}

impl<C: Clock> PortalClient<C> {
    pub fn with_clock(
        username: impl Into<String>,
        password: impl Into<String>,
        clock: C,
    ) -> Result<Self, PortalError> {
        Ok(Self {
            username: username.into(),
            password: password.into(),
            endpoints: PortalEndpoints::default(),
            retry: RetryPolicy::default(),
            clock,
            http: build_http_client()?,
            session: Session::default(),
            dashboard_data: None,
            usage_data: None,
        })
    }

    pub fn with_endpoints(mut self, endpoints: PortalEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dashboard_data(&self) -> Option<&DashboardSnapshot> {
        self.dashboard_data.as_ref()
    }

    pub fn usage_data(&self) -> Option<&[UsageRecord]> {
        self.usage_data.as_deref()
    }

    pub fn login(&mut self) -> Result<(), PortalError> {
        self.session = Session::default();
        // A fresh client drops every cookie from the previous session.
        self.http = build_http_client()?;

        tracing::info!(username = %self.username, "logging in to portal");

        let login_url = self.endpoints.login_page();
        let page = self
            .fetch(&login_url, Reauth::Forbidden)
            .ok_or_else(|| PortalError::Unavailable {
                url: login_url.clone(),
            })?;
        if page.status() != StatusCode::OK {
            tracing::warn!(status = page.status().as_u16(), "login page unavailable");
            return Err(PortalError::Unavailable { url: login_url });
        }

        let token = extract_login_token(&page.text()?)?;

        let form = [
            ("Username", self.username.as_str()),
            ("Password", self.password.as_str()),
            (token.name.as_str(), token.value.as_str()),
        ];
        let submitted = self.http.post(&login_url).form(&form).send()?;
        tracing::debug!(status = submitted.status().as_u16(), "login form submitted");

        let selector_url = self.endpoints.account_selector();
        let accounts: Vec<AccountSummary> = match self.fetch(&selector_url, Reauth::Forbidden) {
            Some(response) => serde_json::from_str(&response.text()?)?,
            None => return Err(PortalError::Unavailable { url: selector_url }),
        };
        let Some(account_number) = accounts.first().and_then(AccountSummary::account_number_text)
        else {
            tracing::warn!("account selector returned no accounts; login failed");
            return Err(PortalError::NoAccounts);
        };

        let dashboard_url = self.endpoints.account_dashboard(&account_number);
        let dashboard: DashboardSnapshot = match self.fetch(&dashboard_url, Reauth::Forbidden) {
            Some(response) => serde_json::from_str(&response.text()?)?,
            None => return Err(PortalError::Unavailable { url: dashboard_url }),
        };

        let premise_id = dashboard.premise_id().map(ToString::to_string);
        self.dashboard_data = Some(dashboard);

        match premise_id {
            Some(premise_id) => {
                tracing::info!(
                    account_number = %account_number,
                    premise_id = %premise_id,
                    "portal login established"
                );
                self.session = Session {
                    logged_in: true,
                    account_number: Some(account_number),
                    premise_id: Some(premise_id),
                };
                Ok(())
            }
            None => {
                tracing::warn!("dashboard response carried no premise id; login failed");
                Err(PortalError::SessionIncomplete)
            }
        }
    }

    pub fn logout(&mut self) -> Result<(), PortalError> {
        tracing::info!("logging out of portal");
        let logout_url = self.endpoints.logout();
        let _ = self.fetch(&logout_url, Reauth::Forbidden);
        self.session = Session::default();
        self.http = build_http_client()?;
        Ok(())
    }

    /// Usage for the last `days_back` days up to and including today.
    pub fn get_usage(
        &mut self,
        days_back: i64,
        interval: Interval,
    ) -> Result<Option<UsageReport>, PortalError> {
        let range = DateRange::ending_today(&self.clock, days_back)?;
        self.get_usage_range(range.start(), range.end(), interval)
    }

    /// Usage for an inclusive historical range. Returns `Ok(None)` when the
    /// portal produced no fresh data this cycle; previously cached data is
    /// left untouched.
    pub fn get_usage_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Option<UsageReport>, PortalError> {
        let range = DateRange::new(start, end)?;

        if !self.session.logged_in {
            self.login()?;
        }
        let Some(premise_id) = self.session.premise_id.clone() else {
            return Err(PortalError::SessionIncomplete);
        };

        let url = self.endpoints.usage_report(&premise_id, interval, &range);
        tracing::info!(url = %url, "fetching usage report");

        let Some(response) = self.fetch(&url, Reauth::Allowed) else {
            tracing::warn!(url = %url, "usage fetch produced no fresh data this cycle");
            return Ok(None);
        };
        let payload: UsageQueryResponse = serde_json::from_str(&response.text()?)?;

        self.usage_data = Some(payload.data.clone());
        let Some(dashboard) = self.dashboard_data.clone() else {
            return Err(PortalError::SessionIncomplete);
        };

        Ok(Some(UsageReport {
            usage: payload.data,
            dashboard,
        }))
    }

    /// Bounded fetch with backoff. Re-logins triggered by session-loss
    /// statuses consume attempts from the same budget, so the loop always
    /// terminates.
    fn fetch(&mut self, url: &str, reauth: Reauth) -> Option<Response> {
        for attempt in 0..self.retry.max_attempts {
            let delay = self.retry.delay_before_retry(attempt);

            let response = match self.http.get(url).send() {
                Ok(response) => response,
                Err(error) if error.is_connect() || error.is_timeout() => {
                    tracing::info!(
                        error = %error,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "connection error, retrying after backoff"
                    );
                    thread::sleep(delay);
                    continue;
                }
                Err(error) => {
                    tracing::error!(error = %error, url, "request failed without a retryable cause");
                    return None;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Some(response);
            }

            if RETRY_STATUS.contains(&status) {
                tracing::info!(
                    status = status.as_u16(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retryable portal status, backing off"
                );
                thread::sleep(delay);
                continue;
            }

            if SESSION_LOST_STATUS.contains(&status) {
                if reauth == Reauth::Allowed {
                    tracing::info!(status = status.as_u16(), "portal session lost, logging in again");
                    if let Err(error) = self.login() {
                        tracing::warn!(error = %error, "re-login after session loss failed");
                    }
                } else {
                    tracing::debug!(
                        status = status.as_u16(),
                        "session-loss status while establishing a session, retrying"
                    );
                }
                continue;
            }

            tracing::error!(status = status.as_u16(), url, "unhandled portal status, giving up");
            return None;
        }

        tracing::warn!(
            url,
            attempts = self.retry.max_attempts,
            "portal fetch exhausted its attempt budget"
        );
        None
    }
}

impl<C: Clock + Send + 'static> UsageProvider for PortalClient<C> {
    fn fetch_usage(
        &mut self,
        days_back: i64,
        interval: Interval,
    ) -> Result<Option<UsageReport>, PortalError> {
        self.get_usage(days_back, interval)
    }
}

fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
        .user_agent(concat!("evergy-home-api/", env!("CARGO_PKG_VERSION")))
        .build()
}
