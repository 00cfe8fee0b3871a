use moodcast_telemetry::{LogLevel, Telemetry};
use serde_json::Value;

// Telemetry sinks must never fail a training run or an analysis call.

pub(crate) fn log(telemetry: &Telemetry, level: LogLevel, message: &str, metadata: Value) {
    if let Err(err) = telemetry.log(level, message, metadata) {
        eprintln!("[{}] log write failed: {err:#}", telemetry.module());
    }
}

pub(crate) fn event(telemetry: &Telemetry, event_type: &str, payload: Value) {
    if let Err(err) = telemetry.event(event_type, payload) {
        eprintln!("[{}] event {event_type} not published: {err:#}", telemetry.module());
    }
}
