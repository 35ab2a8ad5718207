//! Typed configuration for Hermes.
//!
//! This crate provides a strongly-typed configuration for a Hermes mediator
//! with support for:
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! [`HermesConfig`] groups two sections:
//!
//! - [`DispatchConfig`](hermes_dispatch::DispatchConfig) - event fan-out,
//!   panic capture and dispatch logging
//! - [`TelemetryConfig`](hermes_telemetry::TelemetryConfig) - logging and
//!   Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use hermes_config::ConfigLoader;
//!
//! # fn main() -> Result<(), hermes_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("hermes.toml")?
//!     .with_env_prefix("HERMES")
//!     .load()?;
//!
//! println!("events fan out {}", config.dispatch.event_fan_out.as_str());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [dispatch]
//! event_fan_out = "parallel"   # or "sequential"
//! capture_panics = true
//! log_dispatches = true
//!
//! [telemetry]
//! service_name = "orders"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"              # or "pretty"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment Variables
//!
//! With prefix `HERMES`:
//!
//! - `HERMES__DISPATCH__EVENT_FAN_OUT=sequential`
//! - `HERMES__DISPATCH__CAPTURE_PANICS=false`
//! - `HERMES__TELEMETRY__SERVICE_NAME=orders`
//! - `HERMES__TELEMETRY__LOGGING__LEVEL=debug`
//! - `HERMES__TELEMETRY__METRICS__ADDR=127.0.0.1:9100`

mod config;
mod error;
mod loader;

pub use config::HermesConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
