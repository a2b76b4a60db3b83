//! Realtime report fetching from the Analytics Data API.
//!
//! [`AnalyticsClient`] builds a fresh HTTP client and access token on every
//! call. There is no retry: any credential, transport or response error is
//! returned to the caller.

use async_trait::async_trait;
use chrono::Utc;
use monitor_core::error::{MonitorError, Result};
use monitor_core::models::{RealtimeReportRequest, ReportRow};
use monitor_core::settings::{CredentialSource, MonitorConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::{fetch_access_token, ServiceAccountKey, ANALYTICS_READONLY_SCOPE};

// ── ReportSource ──────────────────────────────────────────────────────────────

/// Anything that can answer a realtime report request.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn run_realtime_report(&self, request: &RealtimeReportRequest) -> Result<Vec<ReportRow>>;
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct NamedField<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct RunRealtimeReportBody<'a> {
    dimensions: Vec<NamedField<'a>>,
    metrics: Vec<NamedField<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeReportResponse {
    #[serde(default)]
    rows: Vec<RawRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRow {
    #[serde(default)]
    dimension_values: Vec<RawValue>,
    #[serde(default)]
    metric_values: Vec<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    #[serde(default)]
    value: Option<String>,
}

fn request_body(request: &RealtimeReportRequest) -> RunRealtimeReportBody<'_> {
    RunRealtimeReportBody {
        dimensions: request
            .dimensions
            .iter()
            .map(|name| NamedField { name: name.as_str() })
            .collect(),
        metrics: request
            .metrics
            .iter()
            .map(|name| NamedField { name: name.as_str() })
            .collect(),
    }
}

/// Parse a `runRealtimeReport` response body into [`ReportRow`]s.
///
/// A response without `rows` is an empty report. Every row must carry a
/// non-negative integer as its first metric value.
pub fn parse_report(body: &str) -> Result<Vec<ReportRow>> {
    let response: RealtimeReportResponse = serde_json::from_str(body)?;

    response
        .rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let raw_metric = row
                .metric_values
                .into_iter()
                .next()
                .and_then(|v| v.value)
                .ok_or_else(|| {
                    MonitorError::MalformedReport(format!("row {} has no metric value", index))
                })?;

            let metric = raw_metric.trim().parse::<u64>().map_err(|_| {
                MonitorError::MalformedReport(format!(
                    "row {} has non-numeric metric value {:?}",
                    index, raw_metric
                ))
            })?;

            let dimensions = row
                .dimension_values
                .into_iter()
                .map(|v| v.value.unwrap_or_default())
                .collect::<Vec<_>>();

            Ok(ReportRow { dimensions, metric })
        })
        .collect()
}

// ── AnalyticsClient ───────────────────────────────────────────────────────────

/// Analytics Data API (v1beta) realtime report client.
pub struct AnalyticsClient {
    api_base: String,
    credentials: CredentialSource,
}

impl AnalyticsClient {
    pub fn new(api_base: impl Into<String>, credentials: CredentialSource) -> Self {
        Self {
            api_base: api_base.into(),
            credentials,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.analytics_api_base.clone(), config.credentials.clone())
    }

    fn report_url(&self, request: &RealtimeReportRequest) -> String {
        format!(
            "{}/v1beta/{}:runRealtimeReport",
            self.api_base,
            request.property_resource()
        )
    }
}

#[async_trait]
impl ReportSource for AnalyticsClient {
    async fn run_realtime_report(&self, request: &RealtimeReportRequest) -> Result<Vec<ReportRow>> {
        let key = ServiceAccountKey::load(&self.credentials)?;
        let client = reqwest::Client::new();
        let token = fetch_access_token(&client, &key, ANALYTICS_READONLY_SCOPE, Utc::now()).await?;

        debug!(
            property = %request.property_id,
            dimensions = ?request.dimensions,
            metrics = ?request.metrics,
            "requesting realtime report"
        );

        let response = client
            .post(self.report_url(request))
            .bearer_auth(token)
            .json(&request_body(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MonitorError::Api {
                endpoint: "runRealtimeReport".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let rows = parse_report(&body)?;
        debug!(rows = rows.len(), "realtime report received");
        Ok(rows)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
