//! Metrics collection and export for the agent.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use xmr_client::XmrEvent;

/// Metric names.
pub mod names {
    pub const EVENTS_TOTAL: &str = "xmr_events_total";
    pub const CONNECTED: &str = "xmr_connected";
    pub const ERRORS_TOTAL: &str = "xmr_errors_total";
    pub const FRAMES_TOTAL: &str = "xmr_frames_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::EVENTS_TOTAL,
        "Events published by the client, by event name"
    );
    metrics::describe_gauge!(names::CONNECTED, "1 while the relay connection is up");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of client errors");
    metrics::describe_counter!(names::FRAMES_TOTAL, "Frames received from the relay");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record one client event.
pub fn record_event(event: &XmrEvent) {
    let kind = event.kind();
    counter!(names::EVENTS_TOTAL, "event" => kind.as_str()).increment(1);

    match event {
        XmrEvent::Connected => gauge!(names::CONNECTED).set(1.0),
        XmrEvent::Disconnected => gauge!(names::CONNECTED).set(0.0),
        XmrEvent::Error(_) => counter!(names::ERRORS_TOTAL).increment(1),
        XmrEvent::StatusChange(_) => counter!(names::FRAMES_TOTAL).increment(1),
        _ => {}
    }
}
