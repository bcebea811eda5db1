//! Logging initialization for the binary.
//!
//! Controlled by two environment variables:
//! - `GIT_REPLAY_LOG`: an `EnvFilter` directive such as `debug` or
//!   `replay=trace,replay_git=debug`. Unset means `warn`.
//! - `GIT_REPLAY_LOG_FORMAT`: `json` for JSON events and span timings;
//!   anything else gives compact human-readable lines.
//!
//! Output always goes to stderr so stdout stays parseable.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const FILTER_ENV: &str = "GIT_REPLAY_LOG";
const FORMAT_ENV: &str = "GIT_REPLAY_LOG_FORMAT";
const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber. Call once, early in `main`.
pub fn init() {
    let filter =
        EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
    });
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
