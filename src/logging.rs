//! Tracing setup for the runner binary.
//!
//! Library code only emits events; installing a subscriber is left to
//! binaries (and to tests that want to see the output).

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map `-v` occurrences to a level: none = warn, 1 = info, 2 = debug, more = trace.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Filter for the subscriber: `RUST_LOG` directives when set, otherwise
/// `conformer=<level>` from the `-v` count.
pub fn filter_for(verbosity: u8, env_directives: Option<&str>) -> EnvFilter {
    let level = level_for(verbosity).to_string().to_lowercase();
    env_directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(format!("conformer={level}")))
}

/// Install a stderr subscriber.
pub fn init_logging(verbosity: u8) {
    let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter_for(verbosity, env_directives.as_deref());

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}
