//! Logging setup for applications embedding BLOBi.
//!
//! Library crates only emit `tracing` events; nothing is printed until the
//! application installs a subscriber with [`init`].

use anyhow::Context as _;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod env;

/// Installs the global `tracing` subscriber.
///
/// Events go to stderr, filtered by `BLOBI_LOG` (falling back to `RUST_LOG`,
/// then to `warn,blobi=info`). Set `BLOBI_LOG_FORMAT=json` for one JSON object
/// per line.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init() -> anyhow::Result<()> {
    let lookup = |key: &str| std::env::var(key).ok();
    let directives = env::filter_directives(lookup);
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter {directives:?}"))?;

    let layer = match env::log_format(lookup) {
        env::LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        env::LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(!env::ansi_disabled())
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}
