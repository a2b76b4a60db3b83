//! One monitoring run: fetch, aggregate, notify.
//!
//! [`MonitorRun::run_once`] is the only catch-all in the system. A failure in
//! fetching or aggregation is logged with its cause chain and reported to the
//! chat once, best effort; the run itself never returns an error.

use chrono::{DateTime, Utc};
use monitor_core::error::{MonitorError, Result};
use monitor_core::models::{CountryActivity, RealtimeReportRequest};
use monitor_core::settings::MonitorConfig;
use monitor_data::aggregator::ActivityAggregator;
use monitor_data::analytics::{AnalyticsClient, ReportSource};

use crate::notifier::{
    ChatSender, DeliveryReport, LogSender, Notifier, NotifierConfig, TelegramSender,
};

// ── RunOutcome ────────────────────────────────────────────────────────────────

/// What happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Activity was aggregated and the notifications were attempted.
    Completed(DeliveryReport),
    /// The run failed before notifying; `reported` tells whether the error
    /// message reached the chat.
    Failed { error: String, reported: bool },
}

// ── MonitorRun ────────────────────────────────────────────────────────────────

/// The Fetcher → Aggregator → Notifier pipeline for a single invocation.
pub struct MonitorRun {
    source: Box<dyn ReportSource>,
    aggregator: ActivityAggregator,
    notifier: Notifier,
    request: RealtimeReportRequest,
}

impl MonitorRun {
    pub fn new(
        source: Box<dyn ReportSource>,
        aggregator: ActivityAggregator,
        notifier: Notifier,
        request: RealtimeReportRequest,
    ) -> Self {
        Self {
            source,
            aggregator,
            notifier,
            request,
        }
    }

    /// Wire the production components from `config`.
    pub fn from_config(config: &MonitorConfig) -> Self {
        let sender: Box<dyn ChatSender> = if config.dry_run {
            Box::new(LogSender)
        } else {
            Box::new(TelegramSender::from_config(config))
        };

        Self::new(
            Box::new(AnalyticsClient::from_config(config)),
            ActivityAggregator::from_config(config),
            Notifier::new(sender, NotifierConfig::from_config(config)),
            RealtimeReportRequest::for_mode(
                &config.property_id,
                config.counting_mode,
                &config.visitor_id_dimension,
            ),
        )
    }

    /// Run the pipeline once, stamping messages with `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> RunOutcome {
        tracing::debug!(
            property = %self.request.property_id,
            mode = %self.aggregator.mode(),
            "starting analytics monitor run"
        );

        match self.collect().await {
            Ok(activity) => RunOutcome::Completed(self.notifier.notify(&activity, now).await),
            Err(e) => {
                tracing::error!(error = %error_chain(&e), "analytics monitor run failed");
                let error = e.to_string();
                let reported = self.notifier.notify_error(&error).await;
                if !reported {
                    tracing::warn!("error notification could not be delivered");
                }
                RunOutcome::Failed { error, reported }
            }
        }
    }

    async fn collect(&self) -> Result<CountryActivity> {
        let rows = self.source.run_realtime_report(&self.request).await?;
        Ok(self.aggregator.aggregate(&rows))
    }
}

/// Log a configuration error and report it once through `sender`.
///
/// Used before a [`MonitorRun`] exists; like [`MonitorRun::run_once`] it never
/// fails.
pub async fn report_config_error(sender: Box<dyn ChatSender>, err: &MonitorError) -> RunOutcome {
    tracing::error!(error = %error_chain(err), "invalid configuration");
    let notifier = Notifier::new(sender, NotifierConfig::default());
    let error = err.to_string();
    let reported = notifier.notify_error(&error).await;
    if !reported {
        tracing::warn!("error notification could not be delivered");
    }
    RunOutcome::Failed { error, reported }
}

/// Render `err` followed by any distinct underlying causes.
fn error_chain(err: &MonitorError) -> String {
    let mut rendered = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = std::error::Error::source(cause);
    }
    rendered
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSender;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use monitor_core::models::{CountingMode, ReportRow};
    use monitor_core::settings::{CredentialSource, Settings};
    use monitor_core::time_utils::ReportClock;
    use std::sync::{Arc, Mutex};

    // ── helpers ───────────────────────────────────────────────────────────

    /// Returns canned rows, or a credential error when `rows` is `None`.
    struct FakeSource {
        rows: Option<Vec<ReportRow>>,
        requests: Arc<Mutex<Vec<RealtimeReportRequest>>>,
    }

    #[async_trait]
    impl ReportSource for FakeSource {
        async fn run_realtime_report(
            &self,
            request: &RealtimeReportRequest,
        ) -> Result<Vec<ReportRow>> {
            self.requests.lock().unwrap().push(request.clone());
            self.rows
                .clone()
                .ok_or_else(|| MonitorError::Credentials("credential blob is not base64".into()))
        }
    }

    fn countries() -> Vec<String> {
        ["US", "UK", "CA", "Nigeria", "NG"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn build(
        mode: CountingMode,
        rows: Option<Vec<ReportRow>>,
        sender: RecordingSender,
        emit_fallback_on_empty: bool,
    ) -> MonitorRun {
        let source = FakeSource {
            rows,
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        MonitorRun::new(
            Box::new(source),
            ActivityAggregator::new(mode, "file_download", countries()),
            Notifier::new(
                Box::new(sender),
                NotifierConfig {
                    monitor_countries: countries(),
                    emit_fallback_on_empty,
                    clock: ReportClock::utc(),
                },
            ),
            RealtimeReportRequest::for_mode("42", mode, "customUser:visitor_id"),
        )
    }

    // ── successful runs ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_raw_scenario_sends_two_messages() {
        let sender = RecordingSender::default();
        let sent = sender.sent();
        let rows = vec![
            ReportRow::new(["US"], 5),
            ReportRow::new(["UK"], 0),
            ReportRow::new(["CA"], 3),
        ];
        let run = build(CountingMode::Raw, Some(rows), sender, true);

        let outcome = run.run_once(now()).await;

        assert_eq!(
            outcome,
            RunOutcome::Completed(DeliveryReport { attempted: 2, delivered: 2 })
        );
        let sent = sent.lock().unwrap();
        assert!(sent[0].contains("<b>US</b>"));
        assert!(sent[1].contains("<b>CA</b>"));
    }

    #[tokio::test]
    async fn test_dedup_scenario_reports_two_downloaders() {
        let sender = RecordingSender::default();
        let sent = sender.sent();
        let rows = vec![
            ReportRow::new(["NG", "file_download", "user1"], 1),
            ReportRow::new(["NG", "file_download", "user2"], 1),
            ReportRow::new(["NG", "file_download", "user1"], 1),
        ];
        let run = build(CountingMode::PerEventDeduplicated, Some(rows), sender, false);

        run.run_once(now()).await;

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("📥 2 download(s)"));
    }

    #[tokio::test]
    async fn test_empty_report_simple_mode_sends_fallback() {
        let sender = RecordingSender::default();
        let sent = sender.sent();
        let run = build(CountingMode::Raw, Some(vec![]), sender, true);

        let outcome = run.run_once(now()).await;

        assert_eq!(
            outcome,
            RunOutcome::Completed(DeliveryReport { attempted: 1, delivered: 1 })
        );
        assert!(sent.lock().unwrap()[0].starts_with("📊 No active visitors"));
    }

    #[tokio::test]
    async fn test_empty_report_multi_metric_mode_sends_nothing() {
        let sender = RecordingSender::default();
        let sent = sender.sent();
        let run = build(CountingMode::PerEvent, Some(vec![]), sender, false);

        let outcome = run.run_once(now()).await;

        assert_eq!(outcome, RunOutcome::Completed(DeliveryReport::default()));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_abort_run() {
        let sender = RecordingSender::failing_first(1);
        let sent = sender.sent();
        let rows = vec![ReportRow::new(["US"], 5), ReportRow::new(["CA"], 3)];
        let run = build(CountingMode::Raw, Some(rows), sender, true);

        let outcome = run.run_once(now()).await;

        assert_eq!(
            outcome,
            RunOutcome::Completed(DeliveryReport { attempted: 2, delivered: 1 })
        );
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_request_matches_mode() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let source = FakeSource {
            rows: Some(vec![]),
            requests: Arc::clone(&requests),
        };
        let run = MonitorRun::new(
            Box::new(source),
            ActivityAggregator::new(CountingMode::PerEventDeduplicated, "file_download", countries()),
            Notifier::new(
                Box::new(RecordingSender::default()),
                NotifierConfig {
                    monitor_countries: countries(),
                    emit_fallback_on_empty: false,
                    clock: ReportClock::utc(),
                },
            ),
            RealtimeReportRequest::for_mode(
                "42",
                CountingMode::PerEventDeduplicated,
                "customUser:visitor_id",
            ),
        );

        run.run_once(now()).await;

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].property_id, "42");
        assert_eq!(
            requests[0].dimensions,
            vec!["country", "eventName", "customUser:visitor_id"]
        );
    }

    // ── failing runs ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_fetch_error_is_reported_once() {
        let sender = RecordingSender::default();
        let sent = sender.sent();
        let run = build(CountingMode::Raw, None, sender, true);

        let outcome = run.run_once(now()).await;

        assert_eq!(
            outcome,
            RunOutcome::Failed {
                error: "Credential error: credential blob is not base64".to_string(),
                reported: true,
            }
        );
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            "❌ Error in analytics monitor: Credential error: credential blob is not base64"
        );
    }

    #[tokio::test]
    async fn test_error_report_failure_is_swallowed() {
        let sender = RecordingSender::failing_first(usize::MAX);
        let run = build(CountingMode::Raw, None, sender, true);

        let outcome = run.run_once(now()).await;

        assert!(matches!(outcome, RunOutcome::Failed { reported: false, .. }));
    }

    // ── from_config ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_from_config_dry_run_reports_credential_error() {
        let config = MonitorConfig {
            property_id: "42".to_string(),
            telegram_token: "t".to_string(),
            telegram_chat_id: "c".to_string(),
            credentials: CredentialSource::Inline("%%%".to_string()),
            monitor_countries: countries(),
            counting_mode: CountingMode::Raw,
            download_event: "file_download".to_string(),
            visitor_id_dimension: "customUser:visitor_id".to_string(),
            emit_fallback_on_empty: true,
            timezone: None,
            analytics_api_base: "http://127.0.0.1:9".to_string(),
            telegram_api_base: "http://127.0.0.1:9".to_string(),
            dry_run: true,
        };

        let outcome = MonitorRun::from_config(&config).run_once(now()).await;

        match outcome {
            RunOutcome::Failed { error, reported } => {
                assert!(error.starts_with("Credential error"));
                // The dry-run sender always succeeds.
                assert!(reported);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    // ── report_config_error ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_absent_property_id_is_reported_not_fatal() {
        let mut settings = <Settings as clap::Parser>::parse_from([
            "analytics-monitor",
            "--telegram-token",
            "bot-token",
            "--telegram-chat-id",
            "c",
            "--google-credentials",
            "e30=",
        ]);
        settings.property_id = None;
        let err = settings.into_config().unwrap_err();

        let sender = RecordingSender::default();
        let sent = sender.sent();
        let outcome = report_config_error(Box::new(sender), &err).await;

        assert_eq!(
            outcome,
            RunOutcome::Failed {
                error: "Configuration error: property id is not set".to_string(),
                reported: true,
            }
        );
        assert_eq!(
            sent.lock().unwrap().as_slice(),
            ["❌ Error in analytics monitor: Configuration error: property id is not set"]
        );
    }

    #[tokio::test]
    async fn test_config_error_report_failure_is_swallowed() {
        let err = MonitorError::Config("telegram token is not set".to_string());
        let outcome =
            report_config_error(Box::new(RecordingSender::failing_first(usize::MAX)), &err).await;
        assert!(matches!(outcome, RunOutcome::Failed { reported: false, .. }));
    }

    // ── error_chain ───────────────────────────────────────────────────────

    #[test]
    fn test_error_chain_skips_repeated_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = MonitorError::Other(anyhow::Error::new(io).context("loading key"));
        assert_eq!(error_chain(&err), "loading key: disk gone");
    }
}
