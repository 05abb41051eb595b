//! Pestwatch - Telemetry ingestion and threshold-alerting API for field
//! pest monitors
//!
//! This library exposes the core modules for testing and reuse.

pub mod alert;
pub mod common;
pub mod config;
pub mod entity;
pub mod error;
pub mod notifier;
pub mod routes;
