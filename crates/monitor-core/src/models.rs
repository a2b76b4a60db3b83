use std::collections::HashMap;
use std::fmt;

/// Dimension holding the visitor's country name.
pub const DIMENSION_COUNTRY: &str = "country";
/// Dimension holding the event name.
pub const DIMENSION_EVENT_NAME: &str = "eventName";
/// Metric counting distinct active users in the realtime window.
pub const METRIC_ACTIVE_USERS: &str = "activeUsers";
/// Metric counting events in the realtime window.
pub const METRIC_EVENT_COUNT: &str = "eventCount";

/// Event name recorded by enhanced measurement for file downloads.
pub const DEFAULT_DOWNLOAD_EVENT: &str = "file_download";
/// Default custom dimension carrying a per-visitor identifier.
pub const DEFAULT_VISITOR_ID_DIMENSION: &str = "customUser:visitor_id";

/// How report rows are turned into per-country counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CountingMode {
    /// Country-only report; each row's active-user count is the visitor count.
    Raw,
    /// Country and event report; event counts go to visitors or downloads.
    PerEvent,
    /// Like `PerEvent`, but downloads count distinct visitor identifiers.
    PerEventDeduplicated,
}

impl CountingMode {
    /// `true` for the modes that report both visitors and downloads.
    pub fn is_multi_metric(self) -> bool {
        !matches!(self, CountingMode::Raw)
    }

    /// Fallback-message default used when the flag is not set explicitly.
    pub fn default_emit_fallback(self) -> bool {
        !self.is_multi_metric()
    }
}

impl fmt::Display for CountingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CountingMode::Raw => "raw",
            CountingMode::PerEvent => "per-event",
            CountingMode::PerEventDeduplicated => "per-event-deduplicated",
        };
        f.write_str(name)
    }
}

/// Recognised event kinds. Anything that is not a download counts as a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Download,
    Other,
}

impl EventKind {
    /// Classify `name` against the configured download event (exact match).
    pub fn classify(name: &str, download_event: &str) -> Self {
        if name == download_event {
            EventKind::Download
        } else {
            EventKind::Other
        }
    }
}

/// One row of a realtime report.
///
/// Dimension values are kept in request order: country, then the optional
/// event name, then the optional visitor identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub dimensions: Vec<String>,
    /// First metric value of the row.
    pub metric: u64,
}

impl ReportRow {
    pub fn new<I, S>(dimensions: I, metric: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dimensions: dimensions.into_iter().map(Into::into).collect(),
            metric,
        }
    }

    /// Country name, or an empty string for a row without dimensions.
    pub fn country(&self) -> &str {
        self.dimensions.first().map(String::as_str).unwrap_or("")
    }

    pub fn event_name(&self) -> Option<&str> {
        self.dimensions.get(1).map(String::as_str)
    }

    pub fn visitor_id(&self) -> Option<&str> {
        self.dimensions.get(2).map(String::as_str)
    }
}

/// Country name → count.
pub type CountryCounts = HashMap<String, u64>;

/// Visitor and download counts for the monitored countries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryActivity {
    pub visitors: CountryCounts,
    pub downloads: CountryCounts,
}

impl CountryActivity {
    pub fn visitors_in(&self, country: &str) -> u64 {
        self.visitors.get(country).copied().unwrap_or(0)
    }

    pub fn downloads_in(&self, country: &str) -> u64 {
        self.downloads.get(country).copied().unwrap_or(0)
    }
}

/// Request shape for a realtime report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeReportRequest {
    pub property_id: String,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
}

impl RealtimeReportRequest {
    /// Build the request matching `mode`.
    ///
    /// `visitor_id_dimension` is only requested in
    /// [`CountingMode::PerEventDeduplicated`].
    pub fn for_mode(property_id: &str, mode: CountingMode, visitor_id_dimension: &str) -> Self {
        let (dimensions, metric) = match mode {
            CountingMode::Raw => (vec![DIMENSION_COUNTRY], METRIC_ACTIVE_USERS),
            CountingMode::PerEvent => (
                vec![DIMENSION_COUNTRY, DIMENSION_EVENT_NAME],
                METRIC_EVENT_COUNT,
            ),
            CountingMode::PerEventDeduplicated => (
                vec![DIMENSION_COUNTRY, DIMENSION_EVENT_NAME, visitor_id_dimension],
                METRIC_EVENT_COUNT,
            ),
        };

        Self {
            property_id: property_id.to_string(),
            dimensions: dimensions.into_iter().map(str::to_string).collect(),
            metrics: vec![metric.to_string()],
        }
    }

    /// Resource name used in the API path, e.g. `properties/123`.
    pub fn property_resource(&self) -> String {
        format!("properties/{}", self.property_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_mode_multi_metric() {
        assert!(!CountingMode::Raw.is_multi_metric());
        assert!(CountingMode::PerEvent.is_multi_metric());
        assert!(CountingMode::PerEventDeduplicated.is_multi_metric());
    }

    #[test]
    fn test_counting_mode_fallback_default() {
        assert!(CountingMode::Raw.default_emit_fallback());
        assert!(!CountingMode::PerEvent.default_emit_fallback());
        assert!(!CountingMode::PerEventDeduplicated.default_emit_fallback());
    }

    #[test]
    fn test_counting_mode_display_matches_cli_names() {
        assert_eq!(CountingMode::Raw.to_string(), "raw");
        assert_eq!(CountingMode::PerEvent.to_string(), "per-event");
        assert_eq!(
            CountingMode::PerEventDeduplicated.to_string(),
            "per-event-deduplicated"
        );
    }

    #[test]
    fn test_event_kind_classify() {
        assert_eq!(
            EventKind::classify("file_download", DEFAULT_DOWNLOAD_EVENT),
            EventKind::Download
        );
        assert_eq!(
            EventKind::classify("page_view", DEFAULT_DOWNLOAD_EVENT),
            EventKind::Other
        );
        // Exact, case-sensitive match only.
        assert_eq!(
            EventKind::classify("File_Download", DEFAULT_DOWNLOAD_EVENT),
            EventKind::Other
        );
    }

    #[test]
    fn test_report_row_accessors() {
        let row = ReportRow::new(["Nigeria", "file_download", "user1"], 1);
        assert_eq!(row.country(), "Nigeria");
        assert_eq!(row.event_name(), Some("file_download"));
        assert_eq!(row.visitor_id(), Some("user1"));

        let row = ReportRow::new(["Canada"], 3);
        assert_eq!(row.event_name(), None);
        assert_eq!(row.visitor_id(), None);
    }

    #[test]
    fn test_report_row_without_dimensions() {
        let row = ReportRow::new(Vec::<String>::new(), 4);
        assert_eq!(row.country(), "");
    }

    #[test]
    fn test_country_activity_lookup() {
        let mut activity = CountryActivity::default();
        assert_eq!(activity.visitors_in("Canada"), 0);

        activity.visitors.insert("Canada".to_string(), 3);
        activity.downloads.insert("Nigeria".to_string(), 2);

        assert_eq!(activity.visitors_in("Canada"), 3);
        assert_eq!(activity.downloads_in("Canada"), 0);
        assert_eq!(activity.downloads_in("Nigeria"), 2);
        assert_eq!(activity.visitors_in("United Kingdom"), 0);
    }

    #[test]
    fn test_request_for_raw_mode() {
        let req = RealtimeReportRequest::for_mode("123", CountingMode::Raw, "ignored");
        assert_eq!(req.dimensions, vec!["country"]);
        assert_eq!(req.metrics, vec!["activeUsers"]);
        assert_eq!(req.property_resource(), "properties/123");
    }

    #[test]
    fn test_request_for_per_event_mode() {
        let req = RealtimeReportRequest::for_mode("123", CountingMode::PerEvent, "ignored");
        assert_eq!(req.dimensions, vec!["country", "eventName"]);
        assert_eq!(req.metrics, vec!["eventCount"]);
    }

    #[test]
    fn test_request_for_deduplicated_mode() {
        let req = RealtimeReportRequest::for_mode(
            "123",
            CountingMode::PerEventDeduplicated,
            DEFAULT_VISITOR_ID_DIMENSION,
        );
        assert_eq!(
            req.dimensions,
            vec!["country", "eventName", "customUser:visitor_id"]
        );
        assert_eq!(req.metrics, vec!["eventCount"]);
    }
}
