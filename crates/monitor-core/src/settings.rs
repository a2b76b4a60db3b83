use clap::Parser;
use std::path::PathBuf;

use crate::error::{MonitorError, Result};
use crate::models::{CountingMode, DEFAULT_DOWNLOAD_EVENT, DEFAULT_VISITOR_ID_DIMENSION};
use crate::time_utils::validate_timezone;

/// Countries reported on when `COUNTRIES_TO_MONITOR` is not set.
pub const DEFAULT_COUNTRIES: &str = "United States,United Kingdom,Canada,Nigeria";
pub const DEFAULT_ANALYTICS_API_BASE: &str = "https://analyticsdata.googleapis.com";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

// ── Settings (CLI / environment) ───────────────────────────────────────────────

/// Report realtime visitors and downloads from selected countries to Telegram
#[derive(Parser, Debug, Clone)]
#[command(
    name = "analytics-monitor",
    about = "Report realtime visitors and downloads from selected countries to Telegram",
    version
)]
pub struct Settings {
    /// Analytics property identifier
    #[arg(long, env = "PROPERTY_ID")]
    pub property_id: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    /// Telegram chat identifier
    #[arg(long, env = "TELEGRAM_CHAT_ID", allow_hyphen_values = true)]
    pub telegram_chat_id: Option<String>,

    /// Base64-encoded service-account JSON (raw JSON is also accepted)
    #[arg(long, env = "GOOGLE_CREDENTIALS", hide_env_values = true)]
    pub google_credentials: Option<String>,

    /// Path to a service-account JSON file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub credentials_file: Option<PathBuf>,

    /// Comma-separated list of country names to report on
    #[arg(
        long,
        env = "COUNTRIES_TO_MONITOR",
        value_delimiter = ',',
        default_value = DEFAULT_COUNTRIES
    )]
    pub countries: Vec<String>,

    /// Counting mode
    #[arg(long, env = "COUNTING_MODE", value_enum, default_value_t = CountingMode::Raw)]
    pub counting_mode: CountingMode,

    /// Event name treated as a file download
    #[arg(long, env = "DOWNLOAD_EVENT", default_value = DEFAULT_DOWNLOAD_EVENT)]
    pub download_event: String,

    /// Dimension carrying the visitor identifier (deduplicated mode only)
    #[arg(long, env = "VISITOR_ID_DIMENSION", default_value = DEFAULT_VISITOR_ID_DIMENSION)]
    pub visitor_id_dimension: String,

    /// Send a "no active visitors" message when nothing was seen
    /// (defaults to true in raw mode, false otherwise)
    #[arg(long, env = "EMIT_FALLBACK_ON_EMPTY")]
    pub emit_fallback_on_empty: Option<bool>,

    /// Timezone for message timestamps ("auto" for the system zone; UTC if unset)
    #[arg(long, env = "MONITOR_TIMEZONE")]
    pub timezone: Option<String>,

    /// Analytics Data API base URL
    #[arg(long, env = "ANALYTICS_API_BASE", default_value = DEFAULT_ANALYTICS_API_BASE)]
    pub analytics_api_base: String,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_BASE", default_value = DEFAULT_TELEGRAM_API_BASE)]
    pub telegram_api_base: String,

    /// Logging level
    #[arg(
        long,
        env = "LOG_LEVEL",
        default_value = "INFO",
        ignore_case = true,
        value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]
    )]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log messages instead of posting them
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,
}

// ── CredentialSource ───────────────────────────────────────────────────────────

/// Where the service-account key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Base64 (or raw) JSON passed through the environment.
    Inline(String),
    /// A key file on disk.
    File(PathBuf),
}

// ── MonitorConfig ──────────────────────────────────────────────────────────────

/// Validated configuration for a single run, handed to each component.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub property_id: String,
    pub telegram_token: String,
    pub telegram_chat_id: String,
    pub credentials: CredentialSource,
    /// Allow-list in reporting order.
    pub monitor_countries: Vec<String>,
    pub counting_mode: CountingMode,
    pub download_event: String,
    pub visitor_id_dimension: String,
    pub emit_fallback_on_empty: bool,
    pub timezone: Option<String>,
    pub analytics_api_base: String,
    pub telegram_api_base: String,
    pub dry_run: bool,
}

impl Settings {
    /// Effective log level after applying `--debug`.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "DEBUG"
        } else {
            &self.log_level
        }
    }

    /// Validate the raw settings and build the per-run [`MonitorConfig`].
    pub fn into_config(self) -> Result<MonitorConfig> {
        let property_id = required("property id", self.property_id.as_deref())?;
        let telegram_token = required("telegram token", self.telegram_token.as_deref())?;
        let telegram_chat_id = required("telegram chat id", self.telegram_chat_id.as_deref())?;

        let mut monitor_countries: Vec<String> = Vec::new();
        for country in self.countries.iter().map(|c| c.trim()) {
            if !country.is_empty() && !monitor_countries.iter().any(|c| c == country) {
                monitor_countries.push(country.to_string());
            }
        }
        if monitor_countries.is_empty() {
            return Err(MonitorError::Config(
                "at least one country must be monitored".to_string(),
            ));
        }

        let inline = self
            .google_credentials
            .filter(|blob| !blob.trim().is_empty());
        let credentials = match (inline, self.credentials_file) {
            (Some(blob), file) => {
                if file.is_some() {
                    tracing::debug!("both credential sources set; using the inline blob");
                }
                CredentialSource::Inline(blob)
            }
            (None, Some(path)) => CredentialSource::File(path),
            (None, None) => {
                return Err(MonitorError::Config(
                    "no credentials: set GOOGLE_CREDENTIALS or GOOGLE_APPLICATION_CREDENTIALS"
                        .to_string(),
                ))
            }
        };

        let download_event = required("download event", Some(self.download_event.as_str()))?;
        let visitor_id_dimension =
            required("visitor id dimension", Some(self.visitor_id_dimension.as_str()))?;

        let timezone = self.timezone.filter(|tz| !tz.trim().is_empty());
        if let Some(tz) = &timezone {
            if !tz.eq_ignore_ascii_case("auto") && !validate_timezone(tz) {
                tracing::warn!(timezone = %tz, "unknown timezone; timestamps will use UTC");
            }
        }

        let emit_fallback_on_empty = self
            .emit_fallback_on_empty
            .unwrap_or_else(|| self.counting_mode.default_emit_fallback());

        Ok(MonitorConfig {
            property_id,
            telegram_token,
            telegram_chat_id,
            credentials,
            monitor_countries,
            counting_mode: self.counting_mode,
            download_event,
            visitor_id_dimension,
            emit_fallback_on_empty,
            timezone,
            analytics_api_base: self.analytics_api_base.trim_end_matches('/').to_string(),
            telegram_api_base: self.telegram_api_base.trim_end_matches('/').to_string(),
            dry_run: self.dry_run,
        })
    }
}

/// Trimmed copy of `value`, or a config error naming `what` when it is
/// unset or blank.
fn required(what: &str, value: Option<&str>) -> Result<String> {
    match value.map(str::trim) {
        None => Err(MonitorError::Config(format!("{} is not set", what))),
        Some("") => Err(MonitorError::Config(format!("{} must not be empty", what))),
        Some(trimmed) => Ok(trimmed.to_string()),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
