use std::thread;
use std::time::Duration;

use chrono::Utc;

use evergy_home_api::adapters::portal::PortalClient;
use evergy_home_api::domain::date_range::Interval;
use evergy_home_api::domain::models::{DashboardSnapshot, UsageRecord};

const POLL_INTERVAL: Duration = Duration::from_secs(900);
const USAGE_DAYS_BACK: i64 = 2;

fn main() {
    let _ = dotenvy::dotenv();

    let Some(username) = env_value("EVERGY_USERNAME") else {
        println!("[{}] ERROR: EVERGY_USERNAME is not set", now_iso());
        return;
    };
    let Some(password) = env_value("EVERGY_PASSWORD") else {
        println!("[{}] ERROR: EVERGY_PASSWORD is not set", now_iso());
        return;
    };

    let mut client = match PortalClient::new(username, password) {
        Ok(client) => client,
        Err(err) => {
            println!(
                "[{}] ERROR: portal client could not be built: {err}",
                now_iso()
            );
            return;
        }
    };

    println!(
        "Starting usage status job (interval: {}s, last {} days)...",
        POLL_INTERVAL.as_secs(),
        USAGE_DAYS_BACK
    );

    loop {
        poll_usage(&mut client);
        println!();
        thread::sleep(POLL_INTERVAL);
    }
}

fn poll_usage(client: &mut PortalClient) {
    match client.get_usage(USAGE_DAYS_BACK, Interval::Day) {
        Ok(Some(report)) => {
            println!("[{}] {}", now_iso(), describe_dashboard(&report.dashboard));
            if report.usage.is_empty() {
                println!("  no usage records in range");
            }
            for record in &report.usage {
                println!("  {}", describe_record(record));
            }
        }
        Ok(None) => println!("[{}] no fresh usage data this cycle", now_iso()),
        Err(err) => println!("[{}] ERROR: usage fetch failed: {err}", now_iso()),
    }
}

fn describe_dashboard(dashboard: &DashboardSnapshot) -> String {
    let address = dashboard.street().unwrap_or("unknown address");
    let bill = fmt_money(dashboard.bill_amount);
    let past_due = match dashboard.is_past_due {
        Some(true) => "yes",
        Some(false) => "no",
        None => "n/a",
    };

    format!("{address} | bill: {bill} | past due: {past_due}")
}

fn describe_record(record: &UsageRecord) -> String {
    format!(
        "{}: usage {} kWh, cost {}, peak {} kW, temp {}-{} F",
        record.period.as_deref().unwrap_or("unknown period"),
        fmt_value(record.usage),
        fmt_money(record.cost),
        fmt_value(record.peak_demand),
        fmt_value(record.min_temp),
        fmt_value(record.max_temp),
    )
}

fn fmt_value(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.1}"),
        None => "n/a".to_string(),
    }
}

fn fmt_money(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("${value:.2}"),
        None => "n/a".to_string(),
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}
