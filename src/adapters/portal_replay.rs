use std::fs;

use serde::Deserialize;

use crate::adapters::portal::{PortalError, UsageProvider};
use crate::domain::date_range::Interval;
use crate::domain::models::{DashboardSnapshot, UsageRecord, UsageReport};

#[derive(Debug, Clone, Deserialize)]
struct ScriptFile {
    #[serde(default = "default_loop")]
    loop_forever: bool,
    dashboard: DashboardSnapshot,
    reports: Vec<ScriptEvent>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScriptEvent {
    ok: Option<Vec<UsageRecord>>,
    error: Option<String>,
}

fn default_loop() -> bool {
    true
}

/// Replays scripted usage reports instead of talking to the portal, for
/// running the service without live credentials.
#[derive(Debug)]
pub struct PortalReplayClient {
    script: ScriptFile,
    next_report: usize,
}

impl PortalReplayClient {
    pub fn from_path(path: &str) -> Result<Self, PortalError> {
        let raw = fs::read_to_string(path)?;
        let script: ScriptFile = serde_json::from_str(&raw)?;

        Ok(Self {
            script,
            next_report: 0,
        })
    }
}

impl UsageProvider for PortalReplayClient {
    fn fetch_usage(
        &mut self,
        _days_back: i64,
        _interval: Interval,
    ) -> Result<Option<UsageReport>, PortalError> {
        if self.script.reports.is_empty() {
            return Ok(None);
        }

        let index = if self.script.loop_forever {
            self.next_report % self.script.reports.len()
        } else {
            self.next_report.min(self.script.reports.len() - 1)
        };
        self.next_report += 1;

        let event = &self.script.reports[index];
        if let Some(message) = &event.error {
            tracing::warn!(message = %message, "replay script simulates a failed refresh");
            return Ok(None);
        }

        match &event.ok {
            Some(records) => Ok(Some(UsageReport {
                usage: records.clone(),
                dashboard: self.script.dashboard.clone(),
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::adapters::portal::UsageProvider;
    use crate::domain::date_range::Interval;

    use super::PortalReplayClient;

    fn write_script(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp script should be created");
        file.write_all(content.as_bytes())
            .expect("script should be written");
        file
    }

    fn script_path(file: &tempfile::NamedTempFile) -> String {
        file.path().to_string_lossy().into_owned()
    }

    #[test]
    fn replays_reports_and_loops_by_default() {
        let file = write_script(
            r#"{
                "dashboard": {"addresses": [{"street": "123 Main St", "premiseId": "p1"}]},
                "reports": [
                    {"ok": [{"period": "2024-05-09", "usage": 23.4}]},
                    {"ok": [{"period": "2024-05-10", "usage": 19.7}]}
                ]
            }"#,
        );
        let mut client =
            PortalReplayClient::from_path(&script_path(&file)).expect("script should load");

        let periods: Vec<_> = (0..3)
            .map(|_| {
                let report = client
                    .fetch_usage(1, Interval::Day)
                    .expect("replay should not error")
                    .expect("replay should produce data");
                report.usage[0].period.clone()
            })
            .collect();

        assert_eq!(
            periods,
            vec![
                Some("2024-05-09".to_string()),
                Some("2024-05-10".to_string()),
                Some("2024-05-09".to_string()),
            ]
        );
    }

    #[test]
    fn sticks_at_last_report_when_looping_is_disabled() {
        let file = write_script(
            r#"{
                "loop_forever": false,
                "dashboard": {"addresses": []},
                "reports": [
                    {"ok": [{"period": "2024-05-09"}]},
                    {"ok": [{"period": "2024-05-10"}]}
                ]
            }"#,
        );
        let mut client =
            PortalReplayClient::from_path(&script_path(&file)).expect("script should load");

        for _ in 0..4 {
            client
                .fetch_usage(1, Interval::Day)
                .expect("replay should not error");
        }
        let last = client
            .fetch_usage(1, Interval::Day)
            .expect("replay should not error")
            .expect("replay should produce data");

        assert_eq!(last.usage[0].period.as_deref(), Some("2024-05-10"));
    }

    #[test]
    fn error_events_degrade_to_no_fresh_data() {
        let file = write_script(
            r#"{
                "dashboard": {"addresses": []},
                "reports": [{"error": "portal maintenance window"}]
            }"#,
        );
        let mut client =
            PortalReplayClient::from_path(&script_path(&file)).expect("script should load");

        let result = client
            .fetch_usage(1, Interval::Day)
            .expect("replay should not error");

        assert!(result.is_none());
    }

    #[test]
    fn rejects_malformed_script() {
        let file = write_script("not json");

        let result = PortalReplayClient::from_path(&script_path(&file));

        assert!(result.is_err());
    }

    #[test]
    fn rejects_missing_script_file() {
        let result = PortalReplayClient::from_path("./does-not-exist/replay.json");

        assert!(result.is_err());
    }
}
