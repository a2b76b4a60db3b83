//! Per-country activity aggregation over realtime report rows.

use std::collections::{HashMap, HashSet};

use monitor_core::models::{CountingMode, CountryActivity, CountryCounts, EventKind, ReportRow};
use monitor_core::settings::MonitorConfig;

// ── ActivityAggregator ────────────────────────────────────────────────────────

/// Turns report rows into visitor and download counts for the monitored
/// countries.
///
/// Rows without an event dimension count as visitors. Rows carrying the
/// download event go to the downloads map, every other event to visitors.
/// In `Raw` and `PerEvent` mode a later row for the same country overwrites
/// an earlier one; counts are not summed.
#[derive(Debug, Clone)]
pub struct ActivityAggregator {
    mode: CountingMode,
    download_event: String,
    monitor_countries: Vec<String>,
}

impl ActivityAggregator {
    pub fn new(
        mode: CountingMode,
        download_event: impl Into<String>,
        monitor_countries: Vec<String>,
    ) -> Self {
        Self {
            mode,
            download_event: download_event.into(),
            monitor_countries,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.counting_mode,
            config.download_event.clone(),
            config.monitor_countries.clone(),
        )
    }

    pub fn mode(&self) -> CountingMode {
        self.mode
    }

    /// Aggregate `rows` into filtered [`CountryActivity`].
    pub fn aggregate(&self, rows: &[ReportRow]) -> CountryActivity {
        let mut visitors = CountryCounts::new();
        let mut downloads = CountryCounts::new();
        // Only populated in deduplicated mode.
        let mut downloaders: HashMap<String, HashSet<String>> = HashMap::new();

        for row in rows {
            let kind = match row.event_name() {
                None => EventKind::Other,
                Some(event) => EventKind::classify(event, &self.download_event),
            };
            let country = row.country().to_string();

            match (kind, self.mode) {
                (EventKind::Other, _) => {
                    visitors.insert(country, row.metric);
                }
                (EventKind::Download, CountingMode::PerEventDeduplicated) => {
                    let visitor_id = row.visitor_id().unwrap_or("");
                    if row.metric == 0 || visitor_id.is_empty() {
                        continue;
                    }
                    let seen = downloaders.entry(country.clone()).or_default();
                    seen.insert(visitor_id.to_string());
                    downloads.insert(country, seen.len() as u64);
                }
                (EventKind::Download, _) => {
                    downloads.insert(country, row.metric);
                }
            }
        }

        let activity = CountryActivity {
            visitors: self.filter_monitored(visitors),
            downloads: self.filter_monitored(downloads),
        };

        tracing::debug!(
            mode = %self.mode,
            rows = rows.len(),
            visitors = ?activity.visitors,
            downloads = ?activity.downloads,
            "aggregated realtime activity"
        );

        activity
    }

    /// Keep only allow-listed countries with a positive count.
    ///
    /// Matching is exact and case-sensitive. Applying the filter twice gives
    /// the same result as applying it once.
    pub fn filter_monitored(&self, counts: CountryCounts) -> CountryCounts {
        counts
            .into_iter()
            .filter(|(country, count)| *count > 0 && self.is_monitored(country))
            .collect()
    }

    fn is_monitored(&self, country: &str) -> bool {
        self.monitor_countries.iter().any(|c| c == country)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
