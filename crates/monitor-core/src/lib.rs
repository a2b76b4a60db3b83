//! Shared types for the analytics monitor.
//!
//! Holds the report data model, configuration, error type, message
//! templates and timestamp helpers used by the data and runtime crates.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;
