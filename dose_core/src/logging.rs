//! tracing setup for dosectl.
//!
//! Events go to stderr; stdout is reserved for command output (`--json` included).

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber at `warn`, or whatever `RUST_LOG` asks for
pub fn init() {
    init_with_level("warn")
}

/// Install the global subscriber; `RUST_LOG` still takes precedence over `default_level`
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Route debug events into the test harness output; safe to call from every test
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
