//! Subscriber wiring. Library crates only emit events; this is the one place
//! a subscriber is installed.

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber, writing to stderr so stdout stays clean
/// for command output. `RUST_LOG` overrides the verbosity-derived filter.
pub fn init_logging(verbosity: u8, json: bool) {
    // 0 = warnings only, 1 (-v) = session lifecycle, 2 (-vv) = every call
    let filter = match verbosity {
        0 => "warn",
        1 => "info,session=info",
        2 => "info,session=debug,http_transport=debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(stderr)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
