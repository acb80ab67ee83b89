//! Prometheus metrics for the Conduit runtime.
//!
//! All metrics follow the naming convention: `conduit_<metric>_<unit>`
//!
//! | Metric | Type |
//! |--------|------|
//! | `conduit_components_started_total` | Counter |
//! | `conduit_components_stopped_total` | Counter |
//! | `conduit_transition_failures_total` | CounterVec (`transition`) |
//! | `conduit_bindings_total` | Gauge |
//! | `conduit_swaps_total` | Counter |
//! | `conduit_events_published_total` | Counter |

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Process metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Successful start transitions
    pub static ref COMPONENTS_STARTED: IntCounter = register(IntCounter::new(
        "conduit_components_started_total",
        "Total number of successful component starts"
    ).expect("metric creation failed"));

    /// Successful stop transitions
    pub static ref COMPONENTS_STOPPED: IntCounter = register(IntCounter::new(
        "conduit_components_stopped_total",
        "Total number of successful component stops"
    ).expect("metric creation failed"));

    /// Failed transitions by kind (configure/start/stop/update/swap)
    pub static ref TRANSITION_FAILURES: IntCounterVec = register(IntCounterVec::new(
        Opts::new("conduit_transition_failures_total", "Failed component transitions"),
        &["transition"]
    ).expect("metric creation failed"));

    /// Live (component, key) bindings in the object-service registry
    pub static ref BINDINGS: IntGauge = register(IntGauge::new(
        "conduit_bindings_total",
        "Current number of live object bindings"
    ).expect("metric creation failed"));

    /// Swap transitions
    pub static ref SWAPS: IntCounter = register(IntCounter::new(
        "conduit_swaps_total",
        "Total number of key swaps"
    ).expect("metric creation failed"));

    /// Runtime events published on the event bus
    pub static ref EVENTS_PUBLISHED: IntCounter = register(IntCounter::new(
        "conduit_events_published_total",
        "Total number of runtime events published"
    ).expect("metric creation failed"));
}

fn register<M>(metric: M) -> M
where
    M: prometheus::core::Collector + Clone + 'static,
{
    // Registration only fails on duplicate names, which the statics rule out.
    let _ = REGISTRY.register(Box::new(metric.clone()));
    metric
}

fn touch_all() {
    lazy_static::initialize(&COMPONENTS_STARTED);
    lazy_static::initialize(&COMPONENTS_STOPPED);
    lazy_static::initialize(&TRANSITION_FAILURES);
    lazy_static::initialize(&BINDINGS);
    lazy_static::initialize(&SWAPS);
    lazy_static::initialize(&EVENTS_PUBLISHED);
}

/// Encode all runtime metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    touch_all();
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Record a failed transition of the given kind.
pub fn record_transition_failure(transition: &str) {
    TRANSITION_FAILURES.with_label_values(&[transition]).inc();
}
