//! Runtime layer for the analytics monitor.
//!
//! Wires the report fetcher, the aggregator and the chat notifier into a
//! single run and owns the top-level error reporting.

pub mod notifier;
pub mod orchestrator;

#[cfg(test)]
mod test_support;

pub use monitor_core as core;
pub use monitor_data as data;
