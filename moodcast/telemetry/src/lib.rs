#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Telemetry for Moodcast: JSON-lines logs, training/analysis events, and the
//! handle that ties both together for the engine and the CLI.

/// Event records and publishers.
pub mod events;
/// Telemetry handle shared by engine components.
pub mod handle;
/// Structured JSON logging.
pub mod logging;

pub use events::{EventPublisher, EventRecord, EventSubscriber, FileEventPublisher, MemoryEventBus};
pub use handle::{Telemetry, TelemetryBuilder};
pub use logging::{JsonLogger, LogLevel, LogRecord};
