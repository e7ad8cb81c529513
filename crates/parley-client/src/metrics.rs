//! Metrics instrumentation for the chat client.
//!
//! Uses the `metrics` crate facade. Without an installed recorder every
//! call here is a no-op; the binary installs a Prometheus exporter when
//! metrics are enabled.

use metrics::{counter, gauge};
use parley_core::SendKind;
use parley_protocol::FrameKind;

/// Metric names.
pub mod names {
    pub const FRAMES_RECEIVED_TOTAL: &str = "parley_frames_received_total";
    pub const MESSAGES_SENT_TOTAL: &str = "parley_messages_sent_total";
    pub const TYPING_SIGNALS_TOTAL: &str = "parley_typing_signals_total";
    pub const ROOM_REQUESTS_TOTAL: &str = "parley_room_requests_total";
    pub const CONNECTED: &str = "parley_connected";
    pub const ERRORS_TOTAL: &str = "parley_errors_total";
}

/// Describe every metric to the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::FRAMES_RECEIVED_TOTAL,
        "Frames delivered by the transport, by kind"
    );
    metrics::describe_counter!(
        names::MESSAGES_SENT_TOTAL,
        "Messages handed to the transport, by kind"
    );
    metrics::describe_counter!(
        names::TYPING_SIGNALS_TOTAL,
        "Typing presence changes sent"
    );
    metrics::describe_counter!(
        names::ROOM_REQUESTS_TOTAL,
        "Create and join requests, by outcome"
    );
    metrics::describe_gauge!(names::CONNECTED, "1 while the transport is ready");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");
}

/// Record an inbound frame.
pub fn record_frame(kind: FrameKind) {
    counter!(names::FRAMES_RECEIVED_TOTAL, "kind" => kind.as_str()).increment(1);
}

/// Record a message handed to the transport.
pub fn record_sent(kind: SendKind) {
    counter!(names::MESSAGES_SENT_TOTAL, "kind" => kind.as_str()).increment(1);
}

/// Record a typing signal.
pub fn record_typing(typing: bool) {
    let state = if typing { "started" } else { "stopped" };
    counter!(names::TYPING_SIGNALS_TOTAL, "state" => state).increment(1);
}

/// Record a finished room request.
pub fn record_room_request(op: &'static str, ok: bool) {
    let result = if ok { "ok" } else { "failed" };
    counter!(names::ROOM_REQUESTS_TOTAL, "op" => op, "result" => result).increment(1);
}

/// Update the connection gauge.
pub fn set_connected(connected: bool) {
    gauge!(names::CONNECTED).set(if connected { 1.0 } else { 0.0 });
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}
