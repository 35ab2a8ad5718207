//! Top-level configuration type.

use crate::ConfigError;
use hermes_core::FanOut;
use hermes_dispatch::DispatchConfig;
use hermes_telemetry::logging::create_env_filter;
use hermes_telemetry::{LogConfig, TelemetryConfig};
use serde::{Deserialize, Serialize};

/// Complete Hermes configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use hermes_config::HermesConfig;
/// use hermes_core::FanOut;
///
/// let config = HermesConfig::default();
/// assert_eq!(config.dispatch.event_fan_out, FanOut::Parallel);
/// assert_eq!(config.telemetry.service_name, "hermes");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct HermesConfig {
    /// Dispatch behaviour.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl HermesConfig {
    /// Development preset: pretty debug logs, dispatch logging on.
    #[must_use]
    pub fn development() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            telemetry: TelemetryConfig {
                logging: LogConfig::development(),
                ..TelemetryConfig::default()
            },
        }
    }

    /// Production preset: JSON logs, per-dispatch logging off.
    #[must_use]
    pub fn production() -> Self {
        Self {
            dispatch: DispatchConfig {
                log_dispatches: false,
                ..DispatchConfig::default()
            },
            telemetry: TelemetryConfig {
                logging: LogConfig::production(),
                ..TelemetryConfig::default()
            },
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `dispatch.event_fan_out` is not `parallel` or `sequential`
    /// - `telemetry.service_name` is empty
    /// - `telemetry.logging.level` is not a valid filter directive
    /// - `telemetry.metrics.addr` is not a socket address
    /// - `telemetry.metrics.duration_buckets` is empty or not increasing
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(
            self.dispatch.event_fan_out,
            FanOut::Parallel | FanOut::Sequential
        ) {
            return Err(ConfigError::invalid_value(
                "dispatch.event_fan_out",
                format!(
                    "events need a multi-handler fan-out, got {}",
                    self.dispatch.event_fan_out.as_str()
                ),
            ));
        }

        if self.telemetry.service_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.service_name",
                "must not be empty",
            ));
        }

        if self.telemetry.logging.enabled {
            create_env_filter(&self.telemetry.logging.level)
                .map_err(|e| ConfigError::invalid_value("telemetry.logging.level", e.to_string()))?;
        }

        let metrics = &self.telemetry.metrics;
        if metrics.enabled {
            metrics
                .socket_addr()
                .map_err(|e| ConfigError::invalid_value("telemetry.metrics.addr", e.to_string()))?;

            let increasing = metrics.duration_buckets.windows(2).all(|w| w[0] < w[1]);
            if metrics.duration_buckets.is_empty() || !increasing {
                return Err(ConfigError::invalid_value(
                    "telemetry.metrics.duration_buckets",
                    "must be a non-empty, strictly increasing list",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(HermesConfig::default().validate().is_ok());
        assert!(HermesConfig::development().validate().is_ok());
        assert!(HermesConfig::production().validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dev = HermesConfig::development();
        assert_eq!(dev.telemetry.logging.level, "debug");
        assert!(dev.dispatch.log_dispatches);

        let prod = HermesConfig::production();
        assert!(!prod.dispatch.log_dispatches);
        assert_eq!(prod.telemetry.logging.level, "info");
    }

    #[test]
    fn test_single_event_fan_out_rejected() {
        let mut config = HermesConfig::default();
        config.dispatch.event_fan_out = FanOut::Single;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dispatch.event_fan_out"));

        config.dispatch.event_fan_out = FanOut::NoOp;
        assert!(config.validate().is_err());

        config.dispatch.event_fan_out = FanOut::Sequential;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_service_name_rejected() {
        let mut config = HermesConfig::default();
        config.telemetry.service_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let mut config = HermesConfig::default();
        config.telemetry.logging.level = "hermes=loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("telemetry.logging.level"));

        config.telemetry.logging.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_metrics_addr_rejected() {
        let mut config = HermesConfig::default();
        config.telemetry.metrics.enabled = true;
        config.telemetry.metrics.addr = Some("not-an-address".to_string());
        assert!(config.validate().is_err());

        config.telemetry.metrics.addr = Some("127.0.0.1:9090".to_string());
        assert!(config.validate().is_ok());

        config.telemetry.metrics.addr = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unsorted_buckets_rejected() {
        let mut config = HermesConfig::default();
        config.telemetry.metrics.enabled = true;
        config.telemetry.metrics.duration_buckets = vec![0.5, 0.1];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result: Result<HermesConfig, _> = toml::from_str("[server]\nport = 8080\n");
        assert!(result.is_err());
    }
}
