//! Tracing subscriber setup for the `qstrack` binary.
//!
//! Filter precedence: `QSTRACK_LOG`, then `--verbose` (`info`), then `warn`.
//! Logs go to stderr so command output on stdout stays clean.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub const ENV_LOG: &str = "QSTRACK_LOG";

/// Build the filter for the given settings.
pub fn filter(env_directive: Option<&str>, verbose: bool) -> EnvFilter {
    let fallback = if verbose { "qstrack=info,warn" } else { "warn" };
    env_directive
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(verbose: bool, json: bool) {
    let directive = std::env::var(ENV_LOG).ok();
    let filter = filter(directive.as_deref(), verbose);

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
