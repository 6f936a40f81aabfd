//! Diagnostics for the CLI.
//!
//! Reads `RUST_LOG` and defaults to `warn`, so failed question lookups show up
//! on stderr without cluttering the wizard prompts on stdout.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
