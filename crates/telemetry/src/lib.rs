//! Tagged telemetry for the webpilot engine
//!
//! Every observable decision the engine makes is emitted as a tag-prefixed
//! line (`[DISCOVERY] ...`, `[CACHE][DRIFT] ...`) so shells can grep or
//! ingest the stream without parsing structured logs. Lines go to `tracing`
//! and to an in-process broadcast stream that backs `stream_logs()`.

pub mod metrics;
pub mod stream;
pub mod tags;

pub use stream::{subscribe, LogLine};
pub use tags::*;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    // A second init (tests, embedded use) is fine.
    let _ = result;
}
