//! Tracing subscriber setup and structured logging helpers.
//!
//! Every runtime log line carries the same field names so logs can be
//! filtered per component or per object:
//! - `component`: component identifier
//! - `object`: object identifier
//! - `key`: binding key (`name` or `name#index`)
//! - `impl_id`: service implementation identifier

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{TelemetryConfig, TelemetryError};

/// Handle returned by [`init_tracing`]. Holding it has no side effects; it
/// records which output format was installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingHandle {
    pub json: bool,
}

/// Install the global tracing subscriber.
///
/// A second call returns [`TelemetryError::AlreadyInitialized`], which callers
/// that share a process (tests, embedded runtimes) may ignore.
pub fn init_tracing(config: &TelemetryConfig) -> Result<TracingHandle, TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    let layer = if config.json_logs {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(config.thread_names)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_names(config.thread_names)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Tracing initialized"
    );

    Ok(TracingHandle {
        json: config.json_logs,
    })
}

/// Emit a log line tagged with the component it concerns.
///
/// ```rust,ignore
/// log_event!(info, component_id, "Component started", key = %key);
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:ident, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = %$component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Emit a log line about one binding of a component.
#[macro_export]
macro_rules! log_binding_event {
    ($level:ident, $component:expr, $key:expr, $object:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = %$component,
            key = %$key,
            object = %$object,
            $($($field)*,)?
            $msg
        )
    };
}
