//! # Conduit Telemetry
//!
//! Logging and metrics for the Conduit runtime.
//!
//! ## Components
//!
//! - **Tracing**: `tracing-subscriber` fmt output, plain or JSON, filtered by
//!   an `EnvFilter` built from the configured level
//! - **Metrics**: Prometheus counters for component transitions, bindings and
//!   published runtime events
//!
//! ## Usage
//!
//! ```rust,ignore
//! use conduit_telemetry::{init_tracing, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _handle = init_tracing(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `conduit` | Service name in the startup log |
//! | `CONDUIT_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `CONDUIT_JSON_LOGS` | `false` | JSON formatted output |
//! | `CONDUIT_THREAD_NAMES` | `true` | Include worker thread names |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_tracing, TracingHandle};
pub use metrics::{
    gather_metrics, record_transition_failure, BINDINGS, COMPONENTS_STARTED, COMPONENTS_STOPPED,
    EVENTS_PUBLISHED, SWAPS, TRANSITION_FAILURES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,

    #[error("Failed to encode Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
