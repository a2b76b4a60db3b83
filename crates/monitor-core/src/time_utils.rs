use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Timestamp layout embedded in every notification.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── ReportClock ───────────────────────────────────────────────────────────────

/// Renders the run timestamp in the configured timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportClock {
    tz: Option<Tz>,
}

impl ReportClock {
    /// Create a clock for `tz_name`.
    ///
    /// * `None` formats plain UTC.
    /// * `"auto"` resolves the system timezone.
    /// * Any other value must be an IANA name; unknown names log a warning
    ///   and fall back to UTC.
    pub fn new(tz_name: Option<&str>) -> Self {
        let Some(name) = tz_name.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::utc();
        };

        let resolved = if name.eq_ignore_ascii_case("auto") {
            get_system_timezone()
        } else {
            name.to_string()
        };

        match resolved.parse::<Tz>() {
            Ok(tz) => Self { tz: Some(tz) },
            Err(_) => {
                warn!(
                    "ReportClock: unrecognised timezone \"{}\", falling back to UTC",
                    resolved
                );
                Self::utc()
            }
        }
    }

    pub fn utc() -> Self {
        Self { tz: None }
    }

    /// Format `now` using [`TIMESTAMP_FORMAT`] in the configured zone.
    pub fn format(&self, now: DateTime<Utc>) -> String {
        match self.tz {
            Some(tz) => now.with_timezone(&tz).format(TIMESTAMP_FORMAT).to_string(),
            None => now.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl Default for ReportClock {
    fn default() -> Self {
        Self::utc()
    }
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    tz_name.parse::<Tz>().is_ok()
}
