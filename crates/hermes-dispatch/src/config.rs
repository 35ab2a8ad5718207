//! Dispatch behaviour settings.

use hermes_core::FanOut;
use serde::{Deserialize, Serialize};

/// Settings applied by [`MediatorBuilder`](crate::MediatorBuilder).
///
/// # Example
///
/// ```
/// use hermes_core::FanOut;
/// use hermes_dispatch::DispatchConfig;
///
/// let config: DispatchConfig = serde_json::from_str(r#"{"event_fan_out": "sequential"}"#).unwrap();
/// assert_eq!(config.event_fan_out, FanOut::Sequential);
/// assert!(config.capture_panics);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Fan-out used for event routes that did not choose one explicitly.
    pub event_fan_out: FanOut,

    /// Whether the hook frames catch panics raised by middleware and handlers.
    ///
    /// When disabled a panic unwinds out of the dispatch call.
    pub capture_panics: bool,

    /// Whether to install [`LoggingObserver`](hermes_middleware::LoggingObserver)
    /// when no observer was registered.
    pub log_dispatches: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            event_fan_out: FanOut::Parallel,
            capture_panics: true,
            log_dispatches: true,
        }
    }
}
