//! Chat notifications for monitored-country activity.
//!
//! Messages are composed in allow-list order and delivered one at a time.
//! A failed delivery is logged and never stops the remaining messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use monitor_core::formatting::{country_message, error_message, no_activity_message};
use monitor_core::models::CountryActivity;
use monitor_core::settings::{MonitorConfig, Settings};
use monitor_core::time_utils::ReportClock;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, error, info};

const PARSE_MODE_HTML: &str = "HTML";

// ── ChatSender ────────────────────────────────────────────────────────────────

/// A single chat destination.
#[async_trait]
pub trait ChatSender: Send + Sync {
    /// Deliver `text`; returns `true` on success. Failures are logged by the
    /// implementation and never raised.
    async fn send_message(&self, text: &str) -> bool;
}

// ── TelegramSender ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Posts messages through the Telegram Bot API `sendMessage` method.
pub struct TelegramSender {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramSender {
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.telegram_api_base.clone(),
            config.telegram_token.clone(),
            config.telegram_chat_id.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl ChatSender for TelegramSender {
    async fn send_message(&self, text: &str) -> bool {
        let body = SendMessageBody {
            chat_id: &self.chat_id,
            text,
            parse_mode: PARSE_MODE_HTML,
        };

        match self.client.post(self.endpoint()).json(&body).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                debug!("telegram message sent");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!(status = %status, body = %body, "failed to send telegram message");
                false
            }
            Err(e) => {
                error!(error = %e, "failed to send telegram message");
                false
            }
        }
    }
}

// ── LogSender ─────────────────────────────────────────────────────────────────

/// Dry-run sender: logs each message instead of posting it.
#[derive(Debug, Default)]
pub struct LogSender;

#[async_trait]
impl ChatSender for LogSender {
    async fn send_message(&self, text: &str) -> bool {
        info!(message = %text, "dry run: message not sent");
        true
    }
}

/// Sender for reporting a configuration error, built from settings that
/// failed validation. Missing chat values are sent as empty strings and the
/// delivery is expected to fail.
pub fn setup_sender(settings: &Settings) -> Box<dyn ChatSender> {
    if settings.dry_run {
        Box::new(LogSender)
    } else {
        Box::new(TelegramSender::new(
            settings.telegram_api_base.trim_end_matches('/'),
            settings.telegram_token.clone().unwrap_or_default(),
            settings.telegram_chat_id.clone().unwrap_or_default(),
        ))
    }
}

// ── Message composition ───────────────────────────────────────────────────────

/// Build the messages for one run.
///
/// One message per country in `monitor_countries` order that has a positive
/// visitor or download count. When nothing qualifies and
/// `emit_fallback_on_empty` is set, a single "no active visitors" message is
/// returned instead.
pub fn compose_messages(
    activity: &CountryActivity,
    monitor_countries: &[String],
    timestamp: &str,
    emit_fallback_on_empty: bool,
) -> Vec<String> {
    let mut messages: Vec<String> = monitor_countries
        .iter()
        .filter_map(|country| {
            country_message(
                country,
                activity.visitors_in(country),
                activity.downloads_in(country),
                timestamp,
            )
        })
        .collect();

    if messages.is_empty() && emit_fallback_on_empty {
        messages.push(no_activity_message(timestamp));
    }
    messages
}

// ── Notifier ──────────────────────────────────────────────────────────────────

/// Notifier settings scoped to one run.
#[derive(Debug, Clone, Default)]
pub struct NotifierConfig {
    pub monitor_countries: Vec<String>,
    pub emit_fallback_on_empty: bool,
    pub clock: ReportClock,
}

impl NotifierConfig {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            monitor_countries: config.monitor_countries.clone(),
            emit_fallback_on_empty: config.emit_fallback_on_empty,
            clock: ReportClock::new(config.timezone.as_deref()),
        }
    }
}

/// Outcome of delivering a batch of messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
}

impl DeliveryReport {
    pub fn failed(&self) -> usize {
        self.attempted - self.delivered
    }
}

/// Formats activity into messages and hands them to a [`ChatSender`].
pub struct Notifier {
    sender: Box<dyn ChatSender>,
    config: NotifierConfig,
}

impl Notifier {
    pub fn new(sender: Box<dyn ChatSender>, config: NotifierConfig) -> Self {
        Self { sender, config }
    }

    /// Send one message per active country (or the fallback), sequentially.
    pub async fn notify(&self, activity: &CountryActivity, now: DateTime<Utc>) -> DeliveryReport {
        let timestamp = self.config.clock.format(now);
        let messages = compose_messages(
            activity,
            &self.config.monitor_countries,
            &timestamp,
            self.config.emit_fallback_on_empty,
        );

        let mut report = DeliveryReport::default();
        for message in &messages {
            report.attempted += 1;
            if self.sender.send_message(message).await {
                report.delivered += 1;
            }
        }

        if report.failed() > 0 {
            error!(
                attempted = report.attempted,
                failed = report.failed(),
                "some notifications were not delivered"
            );
        } else {
            info!(sent = report.delivered, "notifications delivered");
        }
        report
    }

    /// Best-effort report of a failed run.
    pub async fn notify_error(&self, error: &str) -> bool {
        self.sender.send_message(&error_message(error)).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
