//! Data layer for the analytics monitor.
//!
//! Responsible for loading service-account credentials, fetching the
//! realtime report and aggregating its rows into per-country activity.

pub mod aggregator;
pub mod analytics;
pub mod credentials;

#[cfg(any(test, feature = "test-util"))]
pub mod test_support;

pub use monitor_core as core;
